//! Instantaneous tone-frequency estimation for luma, chroma and separator spans
//!
//! Combines a sub-sample zero-crossing period measurement with a spectral
//! centre of gravity over the four Robot36 anchor tones. The result is
//! always clamped to the 1500..=2300 Hz picture band.

use crate::goertzel::goertzel;
use crate::{BLACK_FREQ, WHITE_FREQ};

/// Tones used for the spectral centre of gravity
pub const ANCHOR_FREQS: [f32; 4] = [1200.0, 1500.0, 1900.0, 2300.0];

/// Windows shorter than this fall back to a plain crossing-rate count
const MIN_INTERPOLATED_WINDOW: usize = 4;

/// Period measurements outside this range are discarded
const ZC_ACCEPT_MIN: f32 = 1100.0;
const ZC_ACCEPT_MAX: f32 = 2800.0;

/// Zero-crossing estimates inside this open range are blended with the spectrum
const ZC_TRUST_MIN: f32 = 1100.0;
const ZC_TRUST_MAX: f32 = 2600.0;

const ZC_WEIGHT: f32 = 0.7;
const SPECTRAL_WEIGHT: f32 = 0.3;

/// Clamp range for the crossing-rate fallback
const SHORT_WINDOW_MIN: f32 = 1200.0;
const SHORT_WINDOW_MAX: f32 = 2500.0;

/// Added to the anchor energy sum so silence yields a finite estimate
const ENERGY_EPSILON: f32 = 1e-6;

/// Guard against a zero denominator when interpolating a crossing
const CROSSING_EPSILON: f32 = 1e-10;

/// Estimate the dominant tone frequency of `window`
pub fn estimate_frequency(window: &[f32], sample_rate: f32) -> f32 {
    if window.len() < MIN_INTERPOLATED_WINDOW {
        return crossing_rate(window, sample_rate);
    }

    let spectral = spectral_centroid(window, sample_rate);
    let blended = match zero_crossing_frequency(window, sample_rate) {
        Some(zc) if zc > ZC_TRUST_MIN && zc < ZC_TRUST_MAX => {
            zc * ZC_WEIGHT + spectral * SPECTRAL_WEIGHT
        }
        _ => spectral,
    };

    blended.clamp(BLACK_FREQ, WHITE_FREQ)
}

/// Map a picture-band frequency to an 8-bit value
pub fn freq_to_value(freq: f32) -> u8 {
    let v = ((freq - BLACK_FREQ) / (WHITE_FREQ - BLACK_FREQ)) * 255.0;
    (v as i32).clamp(0, 255) as u8
}

/// Crossing count in either direction divided by twice the window duration
fn crossing_rate(window: &[f32], sample_rate: f32) -> f32 {
    let crossings = window
        .windows(2)
        .filter(|pair| (pair[0] < 0.0) != (pair[1] < 0.0))
        .count();
    let duration = window.len() as f32 / sample_rate;
    let freq = if duration > 0.0 {
        crossings as f32 / (2.0 * duration)
    } else {
        0.0
    };
    freq.clamp(SHORT_WINDOW_MIN, SHORT_WINDOW_MAX)
}

/// Fractional positions of every rising zero crossing in `window`
fn rising_crossings(window: &[f32]) -> Vec<f32> {
    window
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[0] < 0.0 && pair[1] >= 0.0)
        .map(|(i, pair)| {
            let (s0, s1) = (pair[0], pair[1]);
            let frac = -s0 / (s1 - s0 + CROSSING_EPSILON);
            // Crossing lies between index i and i + 1
            i as f32 + frac
        })
        .collect()
}

/// Mean frequency over consecutive rising-crossing pairs, or `None` when no
/// pair yields a plausible period
fn zero_crossing_frequency(window: &[f32], sample_rate: f32) -> Option<f32> {
    let crossings = rising_crossings(window);

    let mut total = 0.0f64;
    let mut count = 0usize;
    for pair in crossings.windows(2) {
        let period = pair[1] - pair[0];
        if period <= 0.0 {
            continue;
        }
        let freq = sample_rate / period;
        if (ZC_ACCEPT_MIN..=ZC_ACCEPT_MAX).contains(&freq) {
            total += freq as f64;
            count += 1;
        }
    }

    (count > 0).then(|| (total / count as f64) as f32)
}

/// Energy-weighted mean of the anchor tones
fn spectral_centroid(window: &[f32], sample_rate: f32) -> f32 {
    let energies = ANCHOR_FREQS.map(|f| goertzel(window, f, sample_rate));
    let sum: f32 = energies.iter().sum::<f32>() + ENERGY_EPSILON;
    let weighted: f32 = energies
        .iter()
        .zip(ANCHOR_FREQS.iter())
        .map(|(e, f)| e * f)
        .sum();
    weighted / sum
}
