//! Robot36 slow-scan television codec
//!
//! Encodes a raster image into a Robot36 audio transmission (VIS header, 240
//! luma/chroma scan lines, silence tail) packaged as a 16-bit mono WAV, and
//! decodes a streamed audio signal back into a 320x240 ARGB image with a
//! resumable state machine.

pub mod buffer;
pub mod color;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod frequency;
pub mod goertzel;
pub mod image;
pub mod resample;
pub mod session;
pub mod tone;
pub mod wav;

pub use decoder::{DecoderState, LineLayout, Robot36Decoder};
pub use encoder::Encoder;
pub use error::{Result, SstvError};
pub use image::{ImageBuffer, RasterImage};
pub use session::{DecodeSession, Progress};

// Image geometry
pub const IMAGE_WIDTH: usize = 320;
pub const IMAGE_HEIGHT: usize = 240;
pub const CHROMA_WIDTH: usize = IMAGE_WIDTH / 2; // 160

// Sample rates
pub const ENCODER_SAMPLE_RATE: u32 = 11025;
pub const DECODER_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_INPUT_SAMPLE_RATE: u32 = 48000;

// Tone frequencies (Hz)
pub const LEADER_FREQ: f32 = 1900.0;
pub const SYNC_FREQ: f32 = 1200.0;
pub const PORCH_FREQ: f32 = 1500.0;
pub const SEPARATOR_FREQ: f32 = 1900.0;
pub const VIS_ONE_FREQ: f32 = 1100.0;
pub const VIS_ZERO_FREQ: f32 = 1300.0;
pub const BLACK_FREQ: f32 = 1500.0;
pub const WHITE_FREQ: f32 = 2300.0;
pub const FREQ_SPAN: f32 = WHITE_FREQ - BLACK_FREQ; // 800

// Header timing (ms)
pub const LEADER_MS: u32 = 300;
pub const BREAK_MS: u32 = 10;
pub const VIS_BIT_MS: u32 = 30;

// Line timing (ms)
pub const SYNC_MS: u32 = 9;
pub const PORCH_MS: u32 = 3;
pub const LUMA_MS: u32 = 88;
pub const SEPARATOR_MS: u32 = 4;
pub const CHROMA_MS: u32 = 44;
pub const LINE_MS: u32 = SYNC_MS + PORCH_MS + LUMA_MS + SEPARATOR_MS + PORCH_MS + CHROMA_MS; // 151

// Separator and back porch of lines announced by a bare 0x08 VIS byte (us)
pub const WIDE_SEPARATOR_US: u32 = 4500;
pub const SHORT_PORCH_US: u32 = 1500;

pub const TAIL_SILENCE_MS: u32 = 700;

// VIS codes
pub const ROBOT36_VIS_CODE: u8 = 0x28;
pub const ROBOT36_ALT_VIS_CODE: u8 = 0x08;

// Decoder detection parameters
pub const SCAN_WINDOW_MS: u32 = 250;
pub const SLIDE_MS: u32 = 10;
/// Share of the signal amplitude at a tone that counts as "present"
pub const TONE_THRESHOLD: f32 = 0.3;
/// Shortest window handed to the frequency estimator during line analysis
pub const MIN_ANALYSIS_WINDOW: usize = 30;
/// Separator estimates this close to 1900 Hz do not indicate line parity
pub const SEPARATOR_TOLERANCE_HZ: f32 = 150.0;

/// Opaque black in packed ARGB
pub const OPAQUE_BLACK: u32 = 0xFF00_0000;

/// Convert a duration to a whole number of samples, truncating like the wire format does
pub const fn ms_to_samples(sample_rate: u32, ms: u32) -> usize {
    (sample_rate as usize * ms as usize) / 1000
}
