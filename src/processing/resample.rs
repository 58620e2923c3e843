// Resampler - linear-interpolation rate conversion and channel downmix
//
// output length = round(len * out / in)
// for output index i: p = i * in / out, lo = floor(p), hi = min(lo + 1, len - 1)
//                     y[i] = x[lo] + (x[hi] - x[lo]) * (p - lo)
//
// Equal rates return the input borrowed and untouched.

use std::borrow::Cow;

use crate::error::PipelineError;

/// Number of output samples for `input_len` samples converted `in → out`,
/// rounded half up.
pub fn resampled_len(input_len: usize, rate_in: u32, rate_out: u32) -> usize {
    if rate_in == 0 {
        return 0;
    }
    let numerator = input_len as u128 * rate_out as u128 + rate_in as u128 / 2;
    (numerator / rate_in as u128) as usize
}

/// Convert mono `input` from `rate_in` to `rate_out`.
///
/// # Errors
/// `ConfigurationInvalid` when either rate is zero.
pub fn resample_linear(
    input: &[f32],
    rate_in: u32,
    rate_out: u32,
) -> Result<Cow<'_, [f32]>, PipelineError> {
    if rate_in == 0 {
        return Err(PipelineError::config(
            "resample.rate_in",
            "input sample rate must be greater than 0",
        ));
    }
    if rate_out == 0 {
        return Err(PipelineError::config(
            "capture.target_sample_rate",
            "target sample rate must be greater than 0",
        ));
    }
    if rate_in == rate_out || input.is_empty() {
        return Ok(Cow::Borrowed(input));
    }

    let output_len = resampled_len(input.len(), rate_in, rate_out);
    let last = input.len() - 1;
    let step = rate_in as f64 / rate_out as f64;

    let output = (0..output_len)
        .map(|i| {
            let position = i as f64 * step;
            let lo = (position.floor() as usize).min(last);
            let hi = (lo + 1).min(last);
            let frac = (position - lo as f64) as f32;
            input[lo] + (input[hi] - input[lo]) * frac
        })
        .collect();

    Ok(Cow::Owned(output))
}

/// Average interleaved channels sample-for-sample into one channel.
///
/// A trailing partial frame is dropped. Mono input is returned borrowed.
pub fn downmix_to_mono(interleaved: &[f32], channels: u16) -> Cow<'_, [f32]> {
    if channels <= 1 {
        return Cow::Borrowed(interleaved);
    }
    let channels = channels as usize;
    Cow::Owned(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_exact_and_borrowed() {
        let input = vec![0.1, -0.4, 0.9, 0.0];
        let output = resample_linear(&input, 16_000, 16_000).unwrap();
        assert!(matches!(output, Cow::Borrowed(_)));
        assert_eq!(output.as_ref(), input.as_slice());
    }

    #[test]
    fn test_upsample_by_two_interpolates_midpoints() {
        let input = vec![0.0, 1.0, 0.0, -1.0];
        let output = resample_linear(&input, 8_000, 16_000).unwrap();
        assert_eq!(
            output.as_ref(),
            &[0.0, 0.5, 1.0, 0.5, 0.0, -0.5, -1.0, -1.0]
        );
    }

    #[test]
    fn test_downsample_by_two_picks_even_samples() {
        let input: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let output = resample_linear(&input, 16_000, 8_000).unwrap();
        assert_eq!(output.as_ref(), &[0.0, 2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_output_length_rounds() {
        assert_eq!(resampled_len(1000, 44_100, 16_000), 363); // 362.81
        assert_eq!(resampled_len(3, 2, 3), 5); // 4.5 rounds up
        assert_eq!(resampled_len(0, 48_000, 16_000), 0);
        let input = vec![0.25; 1000];
        let output = resample_linear(&input, 44_100, 16_000).unwrap();
        assert_eq!(output.len(), 363);
        assert!(output.iter().all(|&s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_round_trip_length_within_one_sample() {
        // Holds whenever the first leg does not shrink the signal; going down
        // first loses up to (r1 / r2) / 2 samples to rounding.
        let rates = [8_000u32, 11_025, 16_000, 22_050, 44_100, 48_000];
        for &r1 in &rates {
            for &r2 in rates.iter().filter(|&&r| r >= r1) {
                for len in [0usize, 1, 7, 160, 1_023, 4_410] {
                    let x = vec![0.5; len];
                    let there = resample_linear(&x, r1, r2).unwrap();
                    let back = resample_linear(&there, r2, r1).unwrap();
                    let diff = back.len() as i64 - len as i64;
                    assert!(
                        diff.abs() <= 1,
                        "len {} via {} -> {} came back as {}",
                        len,
                        r1,
                        r2,
                        back.len()
                    );
                }
            }
        }
    }

    #[test]
    fn test_single_sample_input() {
        let output = resample_linear(&[0.7], 8_000, 48_000).unwrap();
        assert_eq!(output.len(), 6);
        assert!(output.iter().all(|&s| s == 0.7));
    }

    #[test]
    fn test_zero_rates_rejected() {
        assert!(matches!(
            resample_linear(&[0.1], 0, 16_000),
            Err(PipelineError::ConfigurationInvalid { .. })
        ));
        assert!(matches!(
            resample_linear(&[0.1], 16_000, 0),
            Err(PipelineError::ConfigurationInvalid { .. })
        ));
    }

    #[test]
    fn test_downmix_averages_channels() {
        let stereo = vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0, 0.3];
        let mono = downmix_to_mono(&stereo, 2);
        assert_eq!(mono.as_ref(), &[0.5, 0.5, 0.0]);

        let already_mono = vec![0.2, 0.4];
        assert!(matches!(downmix_to_mono(&already_mono, 1), Cow::Borrowed(_)));
    }
}
