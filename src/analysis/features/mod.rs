// FeatureExtractor - classifier input derived from a captured segment
//
// Module organization:
// - types: Data structures (Features, FeatureSet)
// - fft: FFT computation with windowing
// - spectral: Frequency-domain features (centroid, rolloff), FFT and approximate
// - temporal: Time-domain features (RMS, ZCR)
// - mod.rs: Coordinator (FeatureExtractor)
//
// Pipeline per capture:
// 1. Replace non-finite samples with 0.0
// 2. Peak-normalize to 0.95 (silence passes through unchanged)
// 3. RMS and ZCR over the whole normalized sequence
// 4. Centroid and rolloff over the first min(1024, len) normalized samples
//
// References:
// - Peeters, G. (2004). A large set of audio features for sound description
// - Lerch, A. (2012). An Introduction to Audio Content Analysis

pub(crate) mod fft;
mod spectral;
mod temporal;
mod types;

pub use spectral::{approximate_centroid, approximate_rolloff, FEATURE_WINDOW, ROLLOFF_THRESHOLD};
pub use temporal::{compute_rms, compute_zcr};
pub use types::{FeatureSet, Features};

use crate::config::FeatureMode;
use fft::{FftProcessor, FFT_SIZE};
use spectral::SpectralFeatures;

/// Target peak after normalization
pub const NORMALIZATION_PEAK: f32 = 0.95;

/// Scale `samples` so the largest magnitude becomes 0.95.
///
/// All-zero input is returned unchanged.
pub fn normalize(samples: &[f32]) -> Vec<f32> {
    let max_abs = samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
    if max_abs == 0.0 {
        return samples.to_vec();
    }
    let scale = NORMALIZATION_PEAK / max_abs;
    samples.iter().map(|&s| s * scale).collect()
}

fn sanitize(samples: &[f32]) -> Vec<f32> {
    samples
        .iter()
        .map(|&s| if s.is_finite() { s } else { 0.0 })
        .collect()
}

/// FeatureExtractor coordinates normalization and scalar descriptors
///
/// Operates on mono samples at a single, fixed rate (the configured target
/// rate); resampling happens before the extractor sees the audio.
pub struct FeatureExtractor {
    sample_rate: u32,
    mode: FeatureMode,
    fft_processor: FftProcessor,
    spectral_features: SpectralFeatures,
}

impl FeatureExtractor {
    /// Create a new FeatureExtractor
    ///
    /// # Arguments
    /// * `sample_rate` - Rate of the samples passed to `extract` (e.g. 16000)
    /// * `mode` - Centroid/rolloff algorithm
    pub fn new(sample_rate: u32, mode: FeatureMode) -> Self {
        Self {
            sample_rate,
            mode,
            fft_processor: FftProcessor::new(FFT_SIZE),
            spectral_features: SpectralFeatures::new(sample_rate, FFT_SIZE),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn mode(&self) -> FeatureMode {
        self.mode
    }

    /// Compute descriptors over already-normalized samples.
    pub fn extract(&self, normalized: &[f32]) -> Features {
        let window = &normalized[..normalized.len().min(FEATURE_WINDOW)];

        let (spectral_centroid, spectral_rolloff) = match self.mode {
            FeatureMode::Approximate => (
                approximate_centroid(window, self.sample_rate),
                approximate_rolloff(window, self.sample_rate),
            ),
            FeatureMode::Fft => {
                let spectrum = self.fft_processor.compute_magnitude_spectrum(window);
                (
                    self.spectral_features.compute_centroid(&spectrum),
                    self.spectral_features.compute_rolloff(&spectrum),
                )
            }
        };

        Features {
            rms: compute_rms(normalized),
            zero_crossing_rate: compute_zcr(normalized),
            spectral_centroid,
            spectral_rolloff,
        }
    }

    /// Build the full feature set for one capture.
    ///
    /// # Arguments
    /// * `samples` - Mono samples at the extractor's rate
    /// * `original_sample_rate` - Native capture rate, recorded as metadata
    /// * `is_mono` - Whether the capture was single-channel before downmix
    pub fn build_feature_set(
        &self,
        samples: &[f32],
        original_sample_rate: u32,
        is_mono: bool,
    ) -> FeatureSet {
        let normalized = normalize(&sanitize(samples));
        let features = self.extract(&normalized);
        let duration_s = if self.sample_rate == 0 {
            0.0
        } else {
            normalized.len() as f32 / self.sample_rate as f32
        };

        FeatureSet {
            samples: normalized,
            sample_rate: self.sample_rate,
            duration_s,
            features,
            original_sample_rate,
            is_mono,
        }
    }
}
