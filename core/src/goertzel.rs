//! Single-frequency tone magnitude via the Goertzel recurrence

use std::f32::consts::PI;

/// Amplitude of `freq` within `samples`, normalised so that a full-scale
/// sinusoid at exactly `freq` reads close to 1.0
///
/// The target frequency is used directly (no rounding to a DFT bin), which
/// keeps short windows usable for the 1100/1300 Hz VIS pair.
pub fn goertzel(samples: &[f32], freq: f32, sample_rate: f32) -> f32 {
    let n = samples.len();
    if n == 0 || sample_rate <= 0.0 {
        return 0.0;
    }

    let omega = 2.0 * PI * freq / sample_rate;
    let coeff = 2.0 * omega.cos();

    let mut q1 = 0.0f32;
    let mut q2 = 0.0f32;

    for &sample in samples {
        let q0 = coeff * q1 - q2 + sample;
        q2 = q1;
        q1 = q0;
    }

    let real = q1 - q2 * omega.cos();
    let imag = q2 * omega.sin();
    let magnitude = (real * real + imag * imag).sqrt();

    2.0 * magnitude / n as f32
}

/// Fraction of the window's signal amplitude found at `freq`
///
/// The Goertzel amplitude divided by the amplitude of a sinusoid carrying the
/// window's mean power. A clean tone at `freq` reads close to 1.0 at any
/// level; silence reads 0.
pub fn tone_share(samples: &[f32], freq: f32, sample_rate: f32) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let power = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    if power <= 0.0 {
        return 0.0;
    }

    goertzel(samples, freq, sample_rate) / (2.0 * power).sqrt()
}
