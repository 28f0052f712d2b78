//! WAV packaging of encoder output

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::error::Result;

/// Canonical RIFF header length for 16-bit mono PCM
pub const WAV_HEADER_SIZE: usize = 44;

pub fn pcm16_mono_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Package 16-bit samples as a mono WAV file in memory
pub fn write_pcm16_mono(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_SIZE + samples.len() * 2));

    let mut writer = WavWriter::new(&mut cursor, pcm16_mono_spec(sample_rate))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(cursor.into_inner())
}
