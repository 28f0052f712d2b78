use thiserror::Error;

#[derive(Debug, Error)]
pub enum SstvError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Unsupported sample rate: {0} Hz")]
    UnsupportedSampleRate(u32),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

pub type Result<T> = std::result::Result<T, SstvError>;
