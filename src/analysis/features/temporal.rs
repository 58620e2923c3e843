// Temporal module - Time-domain feature extraction
//
// Energy and sign-change features computed directly on the sample sequence.

/// Root-mean-square energy: sqrt(mean(s²)); 0.0 for empty input.
pub fn compute_rms(audio: &[f32]) -> f32 {
    if audio.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = audio.iter().map(|&x| (x as f64) * (x as f64)).sum();
    (sum_squares / audio.len() as f64).sqrt() as f32
}

/// Compute zero-crossing rate (ZCR)
///
/// Fraction of adjacent sample pairs whose signs differ, with 0.0 counted as
/// non-negative. A pure tone at f Hz sampled at R Hz gives roughly 2f / R.
///
/// # Arguments
/// * `audio` - Time-domain audio signal
///
/// # Returns
/// Zero-crossing rate (0.0 to 1.0); 0.0 when fewer than two samples
pub fn compute_zcr(audio: &[f32]) -> f32 {
    if audio.len() < 2 {
        return 0.0;
    }

    let crossings = audio
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();

    crossings as f32 / (audio.len() - 1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_of_constant() {
        assert!((compute_rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
        assert_eq!(compute_rms(&[]), 0.0);
        assert_eq!(compute_rms(&[0.0; 64]), 0.0);
    }

    #[test]
    fn test_zcr_alternating() {
        assert!((compute_zcr(&[1.0, -1.0, 1.0, -1.0, 1.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zcr_zero_counts_as_non_negative() {
        // 0.0 -> 0.5 is not a crossing; 0.5 -> -0.5 is; -0.5 -> 0.0 is
        let zcr = compute_zcr(&[0.0, 0.5, -0.5, 0.0]);
        assert!((zcr - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_zcr_degenerate() {
        assert_eq!(compute_zcr(&[]), 0.0);
        assert_eq!(compute_zcr(&[0.3]), 0.0);
        assert_eq!(compute_zcr(&[0.0; 32]), 0.0);
    }

    #[test]
    fn test_zcr_tracks_frequency() {
        let sample_rate = 16_000.0;
        let audio: Vec<f32> = (0..16_000)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate).sin())
            .collect();
        let expected = 2.0 * 440.0 / sample_rate;
        assert!((compute_zcr(&audio) - expected).abs() < 0.002);
    }
}
