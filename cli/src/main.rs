use clap::{Parser, Subcommand};
use hound::SampleFormat;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use robot36_core::color::{pack_argb, unpack_rgb};
use robot36_core::resample::downmix;
use robot36_core::wav::WAV_HEADER_SIZE;
use robot36_core::{
    DecodeSession, Encoder, Progress, RasterImage, ENCODER_SAMPLE_RATE, IMAGE_HEIGHT,
    IMAGE_WIDTH,
};

/// How often the main thread samples decoder progress
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Silence fed after the last sample of a file, so a recording that stops
/// right at the final chroma sample still completes its last line
const END_PADDING_MS: u64 = 200;

#[derive(Parser)]
#[command(name = "robot36")]
#[command(about = "Robot36 SSTV image encoder and decoder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode an image file to a Robot36 WAV transmission
    Encode {
        /// Input image (PNG, JPEG or BMP); resized to 320x240
        #[arg(value_name = "INPUT_IMAGE")]
        input: PathBuf,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// Output sample rate in Hz; other than 11025 resamples the transmission
        #[arg(long, default_value_t = ENCODER_SAMPLE_RATE)]
        sample_rate: u32,
    },

    /// Decode a Robot36 WAV recording to an image file
    Decode {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Output image file
        #[arg(value_name = "OUTPUT.PNG")]
        output: PathBuf,

        /// Audio fed to the decoder per call, in milliseconds
        #[arg(long, default_value = "100")]
        chunk_ms: u32,

        /// Feed audio at its natural playback speed
        #[arg(long)]
        realtime: bool,

        /// Print progress as JSON lines on stdout
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("Unsupported WAV sample format: {bits}-bit {format:?}")]
    UnsupportedSampleFormat { bits: u16, format: SampleFormat },

    #[error("WAV file has no channels")]
    NoChannels,

    #[error("Decode incomplete: {lines} of {total} lines recovered")]
    IncompleteDecode { lines: usize, total: usize },

    #[error("Decoder feed thread panicked")]
    FeederPanicked,

    #[error("Decode session ended before it could be read")]
    NoSession,
}

#[derive(Serialize)]
struct ProgressLine<'a> {
    line: usize,
    state: &'a str,
    completed: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Encode {
            input,
            output,
            sample_rate,
        } => encode_command(&input, &output, sample_rate)?,
        Commands::Decode {
            input,
            output,
            chunk_ms,
            realtime,
            json,
        } => decode_command(&input, &output, chunk_ms, realtime, json)?,
    }

    Ok(())
}

fn encode_command(
    input_path: &Path,
    output_path: &Path,
    sample_rate: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = image::open(input_path)?.to_rgb8();
    info!(
        "Read {}x{} image from {}",
        source.width(),
        source.height(),
        input_path.display()
    );

    let (width, height) = (IMAGE_WIDTH as u32, IMAGE_HEIGHT as u32);
    let frame = if source.dimensions() == (width, height) {
        source
    } else {
        debug!("Resizing to {}x{}", width, height);
        image::imageops::resize(&source, width, height, image::imageops::FilterType::Triangle)
    };

    let pixels: Vec<u32> = frame
        .pixels()
        .map(|p| pack_argb(p[0], p[1], p[2]))
        .collect();
    let raster = RasterImage::new(IMAGE_WIDTH, IMAGE_HEIGHT, &pixels)?;

    let wav = Encoder::new().encode_resampled(&raster, sample_rate)?;
    std::fs::write(output_path, &wav)?;

    let samples = wav.len().saturating_sub(WAV_HEADER_SIZE) / 2;
    info!(
        "Wrote {} samples ({:.1} s at {} Hz) to {}",
        samples,
        samples as f32 / sample_rate as f32,
        sample_rate,
        output_path.display()
    );
    Ok(())
}

fn decode_command(
    input_path: &Path,
    output_path: &Path,
    chunk_ms: u32,
    realtime: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (samples, sample_rate) = read_wav_mono(input_path)?;
    info!(
        "Read {} samples at {} Hz from {}",
        samples.len(),
        sample_rate,
        input_path.display()
    );

    let session = Arc::new(DecodeSession::new());
    session.start(sample_rate);

    let chunk_ms = chunk_ms.max(1);
    let chunk = ((sample_rate as u64 * chunk_ms as u64) / 1000).max(1) as usize;
    let pace = Duration::from_millis(chunk_ms as u64);
    let padding = vec![0.0f32; (sample_rate as u64 * END_PADDING_MS / 1000) as usize];

    // Audio goes in on one thread while this one watches progress
    let feeder = {
        let session = Arc::clone(&session);
        thread::spawn(move || {
            for piece in samples.chunks(chunk) {
                session.feed(piece, sample_rate);
                if realtime {
                    thread::sleep(pace);
                }
            }
            session.feed(&padding, sample_rate);
        })
    };

    let mut reporter = Reporter::new(json);
    while !feeder.is_finished() {
        if let Some(progress) = session.progress() {
            reporter.report(&progress)?;
        }
        thread::sleep(POLL_INTERVAL);
    }
    feeder.join().map_err(|_| CliError::FeederPanicked)?;

    let progress = session
        .stop()
        .map(|decoder| decoder.progress())
        .ok_or(CliError::NoSession)?;
    reporter.report(&progress)?;

    save_image(output_path, &progress.pixels)?;
    info!("Wrote image to {}", output_path.display());

    if !progress.completed {
        warn!("Decode incomplete after {} of {} lines", progress.line, IMAGE_HEIGHT);
        return Err(CliError::IncompleteDecode {
            lines: progress.line,
            total: IMAGE_HEIGHT,
        }
        .into());
    }

    info!("Decoded {} lines", progress.line);
    Ok(())
}

/// Read any integer or 32-bit float WAV, mixed down to mono in [-1, 1]
fn read_wav_mono(path: &Path) -> Result<(Vec<f32>, u32), Box<dyn std::error::Error>> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    debug!(
        "WAV: {} Hz, {} channels, {} bits {:?}",
        spec.sample_rate, spec.channels, spec.bits_per_sample, spec.sample_format
    );

    if spec.channels == 0 {
        return Err(CliError::NoChannels.into());
    }

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (SampleFormat::Int, bits @ 1..=32) => {
            let scale = (1i64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
        (format, bits) => {
            return Err(CliError::UnsupportedSampleFormat { bits, format }.into());
        }
    };

    let mono = downmix(&interleaved, spec.channels as usize);
    Ok((mono, spec.sample_rate))
}

fn save_image(path: &Path, pixels: &[u32]) -> Result<(), Box<dyn std::error::Error>> {
    let frame = image::RgbImage::from_fn(IMAGE_WIDTH as u32, IMAGE_HEIGHT as u32, |x, y| {
        let (r, g, b) = unpack_rgb(pixels[y as usize * IMAGE_WIDTH + x as usize]);
        image::Rgb([r, g, b])
    });
    frame.save(path)?;
    Ok(())
}

/// Progress output: state changes and every tenth line as log records, or
/// one JSON object per change on stdout
struct Reporter {
    json: bool,
    last: Option<(usize, &'static str)>,
}

impl Reporter {
    fn new(json: bool) -> Self {
        Self { json, last: None }
    }

    fn report(&mut self, progress: &Progress) -> Result<(), serde_json::Error> {
        let current = (progress.line, progress.state_name());
        if self.last == Some(current) {
            return Ok(());
        }
        let state_changed = self.last.map_or(true, |(_, state)| state != current.1);
        self.last = Some(current);

        if self.json {
            let line = ProgressLine {
                line: progress.line,
                state: progress.state_name(),
                completed: progress.completed,
            };
            println!("{}", serde_json::to_string(&line)?);
        } else if state_changed {
            info!("State: {} (line {})", current.1, progress.line);
        } else if progress.line % 10 == 0 || progress.completed {
            info!("Line {}/{}", progress.line, IMAGE_HEIGHT);
        }
        Ok(())
    }
}
