//! Sample-rate conversion for incoming decoder audio
//!
//! Unfiltered linear interpolation. Adequate for tone detection, but not
//! band-limited.

/// Mix interleaved multi-channel audio down to mono by averaging each frame
///
/// A trailing partial frame is dropped.
pub fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Number of output samples produced for `input_len` samples at `from_rate`
pub fn output_len(input_len: usize, from_rate: u32, to_rate: u32) -> usize {
    if from_rate == to_rate {
        return input_len;
    }
    let ratio = from_rate as f64 / to_rate as f64;
    (input_len as f64 / ratio) as usize
}

/// Resample one chunk and append the result to `out`
///
/// Output index `i` reads source position `i * from_rate / to_rate`; positions
/// whose right neighbour falls outside the chunk repeat the last input sample.
pub fn resample_into<E: Extend<f32>>(samples: &[f32], from_rate: u32, to_rate: u32, out: &mut E) {
    if samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return;
    }
    if from_rate == to_rate {
        out.extend(samples.iter().copied());
        return;
    }

    let n = samples.len();
    let ratio = from_rate as f64 / to_rate as f64;
    let count = output_len(n, from_rate, to_rate);

    out.extend((0..count).map(|i| {
        let src_pos = i as f64 * ratio;
        let src_idx = src_pos as usize;
        let frac = src_pos - src_idx as f64;

        if src_idx >= n - 1 {
            samples[n - 1]
        } else {
            ((1.0 - frac) * samples[src_idx] as f64 + frac * samples[src_idx + 1] as f64) as f32
        }
    }));
}

/// Resample audio to a target sample rate using linear interpolation
pub fn resample_audio(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    let mut resampled = Vec::with_capacity(output_len(samples.len(), from_rate, to_rate));
    resample_into(samples, from_rate, to_rate, &mut resampled);
    resampled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_stereo() {
        let stereo = vec![0.2, 0.8, 0.4, 0.6]; // [L, R, L, R]
        let mono = downmix(&stereo, 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.5).abs() < 0.001);
        assert!((mono[1] - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_downmix_drops_partial_frame() {
        let samples = vec![0.3, 0.3, 0.3, 0.9, 0.9, 0.9, 0.5];
        let mono = downmix(&samples, 3);
        assert_eq!(mono.len(), 2);
        assert!((mono[1] - 0.9).abs() < 0.001);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        let samples = vec![0.1, -0.2, 0.3];
        assert_eq!(downmix(&samples, 1), samples);
    }

    #[test]
    fn test_resample_same_rate() {
        let samples = vec![0.1, 0.2, 0.3, 0.4];
        let resampled = resample_audio(&samples, 44100, 44100);
        assert_eq!(resampled, samples);
    }

    #[test]
    fn test_upsample_by_four() {
        let samples = vec![0.0, 0.4, 0.8];
        let resampled = resample_audio(&samples, 11025, 44100);
        assert_eq!(resampled.len(), 12);
        assert!((resampled[1] - 0.1).abs() < 1e-6);
        assert!((resampled[2] - 0.2).abs() < 1e-6);
        assert!((resampled[4] - 0.4).abs() < 1e-6);
        assert!((resampled[6] - 0.6).abs() < 1e-6);
        // Past the last interpolation pair the final sample is held
        assert!(resampled[8..].iter().all(|&s| (s - 0.8).abs() < 1e-6));
    }

    #[test]
    fn test_downsample_count() {
        let samples = vec![0.5; 48000];
        let resampled = resample_audio(&samples, 48000, 44100);
        assert!((44099..=44100).contains(&resampled.len()));
        assert!(resampled.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_output_len_floor() {
        // 10 / (48000/44100) = 9.1875
        assert_eq!(output_len(10, 48000, 44100), 9);
        assert_eq!(output_len(10, 44100, 44100), 10);
        assert_eq!(output_len(3, 11025, 44100), 12);
    }

    #[test]
    fn test_empty_and_zero_rate() {
        let mut out: Vec<f32> = Vec::new();
        resample_into(&[], 48000, 44100, &mut out);
        resample_into(&[0.1, 0.2], 0, 44100, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_resample_preserves_value_range() {
        let samples = vec![0.1, 0.5, -0.3, 0.8, -0.2];
        let resampled = resample_audio(&samples, 16000, 22050);
        for sample in resampled {
            assert!((-0.3..=0.8).contains(&sample), "Sample out of range: {}", sample);
        }
    }
}
