use std::f32::consts::TAU;

/// Phase-continuous sine generator producing 16-bit PCM
///
/// Consecutive calls to [`ToneGenerator::tone`] continue from the phase the
/// previous call ended on, so frequency changes at segment boundaries do not
/// produce discontinuities.
pub struct ToneGenerator {
    sample_rate: f32,
    phase: f32,
    pcm: Vec<i16>,
}

impl ToneGenerator {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            phase: 0.0,
            pcm: Vec::new(),
        }
    }

    pub fn with_capacity(sample_rate: u32, capacity: usize) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            phase: 0.0,
            pcm: Vec::with_capacity(capacity),
        }
    }

    /// Append `samples` samples of a sinusoid at `freq` Hz
    pub fn tone(&mut self, freq: f32, samples: usize) {
        let step = TAU * freq / self.sample_rate;
        self.pcm.reserve(samples);
        for _ in 0..samples {
            self.phase += step;
            if self.phase > TAU {
                self.phase -= TAU;
            }
            let value = (self.phase.sin() * 32767.0) as i32;
            self.pcm.push(value.clamp(i16::MIN as i32, i16::MAX as i32) as i16);
        }
    }

    /// Append `samples` zero samples; phase is left untouched
    pub fn silence(&mut self, samples: usize) {
        self.pcm.resize(self.pcm.len() + samples, 0);
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn len(&self) -> usize {
        self.pcm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }

    pub fn samples(&self) -> &[i16] {
        &self.pcm
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.pcm
    }
}
