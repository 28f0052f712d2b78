use log::debug;

use crate::color::{chroma_blue, chroma_red, luma, unpack_rgb};
use crate::error::{Result, SstvError};
use crate::image::RasterImage;
use crate::resample::resample_audio;
use crate::tone::ToneGenerator;
use crate::wav::write_pcm16_mono;
use crate::{
    ms_to_samples, BLACK_FREQ, BREAK_MS, CHROMA_MS, CHROMA_WIDTH, ENCODER_SAMPLE_RATE,
    FREQ_SPAN, IMAGE_HEIGHT, LEADER_FREQ, LEADER_MS, LINE_MS, LUMA_MS, PORCH_FREQ, PORCH_MS,
    ROBOT36_VIS_CODE, SEPARATOR_FREQ, SEPARATOR_MS, SYNC_FREQ, SYNC_MS, TAIL_SILENCE_MS,
    VIS_BIT_MS, VIS_ONE_FREQ, VIS_ZERO_FREQ,
};

/// Map an 8-bit channel value onto the 1500-2300 Hz image band
pub fn value_to_freq(value: u8) -> f32 {
    BLACK_FREQ + (value as f32 / 255.0) * FREQ_SPAN
}

/// Robot36 encoder at 11025 Hz, 16-bit mono
///
/// Holds no state between calls; every `encode` starts from phase zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct Encoder;

impl Encoder {
    pub fn new() -> Self {
        Self
    }

    /// Encode an image into a complete WAV file
    pub fn encode(&self, image: &RasterImage) -> Result<Vec<u8>> {
        let samples = self.encode_samples(image);
        write_pcm16_mono(&samples, ENCODER_SAMPLE_RATE)
    }

    /// Encode an image into a WAV file at `sample_rate`
    ///
    /// The 11025 Hz transmission is converted with the decoder's linear
    /// interpolation resampler, so no anti-alias filtering is applied.
    pub fn encode_resampled(&self, image: &RasterImage, sample_rate: u32) -> Result<Vec<u8>> {
        if sample_rate == 0 {
            return Err(SstvError::UnsupportedSampleRate(sample_rate));
        }
        if sample_rate == ENCODER_SAMPLE_RATE {
            return self.encode(image);
        }

        let native: Vec<f32> = self
            .encode_samples(image)
            .iter()
            .map(|&s| s as f32 / 32768.0)
            .collect();
        let pcm: Vec<i16> = resample_audio(&native, ENCODER_SAMPLE_RATE, sample_rate)
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
            .collect();
        debug!(
            "Resampled {} samples at {} Hz to {} at {} Hz",
            native.len(),
            ENCODER_SAMPLE_RATE,
            pcm.len(),
            sample_rate
        );

        write_pcm16_mono(&pcm, sample_rate)
    }

    /// Encode an image into raw PCM samples: header + lines + silence tail
    pub fn encode_samples(&self, image: &RasterImage) -> Vec<i16> {
        let lines = image.height().min(IMAGE_HEIGHT);
        let mut gen = ToneGenerator::with_capacity(ENCODER_SAMPLE_RATE, estimated_samples(lines));

        Self::vis_header(&mut gen);
        for y in 0..lines {
            Self::scan_line(&mut gen, image.row(y), y);
        }
        gen.silence(samples_for(TAIL_SILENCE_MS));

        gen.into_samples()
    }

    /// Leader, break, leader, start bit, 7 LSB-first code bits, even parity, stop bit
    fn vis_header(gen: &mut ToneGenerator) {
        gen.tone(LEADER_FREQ, samples_for(LEADER_MS));
        gen.tone(SYNC_FREQ, samples_for(BREAK_MS));
        gen.tone(LEADER_FREQ, samples_for(LEADER_MS));
        gen.tone(SYNC_FREQ, samples_for(VIS_BIT_MS));

        let code = ROBOT36_VIS_CODE & 0x7F;
        let bit_samples = samples_for(VIS_BIT_MS);
        for i in 0..7 {
            let bit = (code >> i) & 1 == 1;
            gen.tone(if bit { VIS_ONE_FREQ } else { VIS_ZERO_FREQ }, bit_samples);
        }
        let parity_even = code.count_ones() % 2 == 0;
        gen.tone(if parity_even { VIS_ZERO_FREQ } else { VIS_ONE_FREQ }, bit_samples);

        gen.tone(SYNC_FREQ, bit_samples);
    }

    fn scan_line(gen: &mut ToneGenerator, row: &[u32], line: usize) {
        let width = row.len();

        gen.tone(SYNC_FREQ, samples_for(SYNC_MS));
        gen.tone(PORCH_FREQ, samples_for(PORCH_MS));

        let luma_total = samples_for(LUMA_MS);
        let per_pixel = luma_total / width;
        let remainder = luma_total - per_pixel * width;
        for (x, &pixel) in row.iter().enumerate() {
            let (r, g, b) = unpack_rgb(pixel);
            let samples = per_pixel + usize::from(x < remainder);
            gen.tone(value_to_freq(luma(r, g, b)), samples);
        }

        gen.tone(SEPARATOR_FREQ, samples_for(SEPARATOR_MS));
        gen.tone(PORCH_FREQ, samples_for(PORCH_MS));

        // Even lines carry Cr, odd lines Cb, averaged over horizontal pixel pairs
        let chroma_total = samples_for(CHROMA_MS);
        let per_column = chroma_total / CHROMA_WIDTH;
        let remainder = chroma_total - per_column * CHROMA_WIDTH;
        for cx in 0..CHROMA_WIDTH {
            let x0 = (cx * width / CHROMA_WIDTH).min(width - 1);
            let x1 = (x0 + 1).min(width - 1);
            let value = chroma_pair(row[x0], row[x1], line % 2 == 0);
            let samples = per_column + usize::from(cx < remainder);
            gen.tone(value_to_freq(value), samples);
        }
    }
}

fn chroma_pair(p0: u32, p1: u32, red: bool) -> u8 {
    let component = |pixel: u32| {
        let (r, g, b) = unpack_rgb(pixel);
        let y = luma(r, g, b);
        if red {
            chroma_red(r, y) as u32
        } else {
            chroma_blue(b, y) as u32
        }
    };
    ((component(p0) + component(p1)) / 2) as u8
}

fn samples_for(ms: u32) -> usize {
    ms_to_samples(ENCODER_SAMPLE_RATE, ms)
}

fn estimated_samples(lines: usize) -> usize {
    let header_ms = 2 * LEADER_MS + BREAK_MS + 10 * VIS_BIT_MS;
    samples_for(header_ms + TAIL_SILENCE_MS) + lines * samples_for(LINE_MS)
}

/// Encode a 320x240 (or any size) image straight to WAV bytes
pub fn encode(image: &RasterImage) -> Result<Vec<u8>> {
    Encoder::new().encode(image)
}
