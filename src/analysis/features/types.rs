// Types module - Data structures for extracted features

use serde::{Deserialize, Serialize};

/// Scalar descriptors computed from one capture
///
/// Every value is finite; silent input yields 0 for energy, crossing rate and
/// centroid, and the Nyquist frequency for rolloff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Features {
    /// Root-mean-square energy of the normalized samples
    pub rms: f32,

    /// Fraction of adjacent sample pairs with differing signs (0.0 to 1.0)
    pub zero_crossing_rate: f32,

    /// Spectral centroid in Hz
    pub spectral_centroid: f32,

    /// Frequency below which 85% of the window energy lies, in Hz
    pub spectral_rolloff: f32,
}

/// Classifier input derived from one closed capture session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Mono samples at `sample_rate`, peak-normalized to 0.95
    pub samples: Vec<f32>,
    /// Target rate the samples were resampled to
    pub sample_rate: u32,
    pub duration_s: f32,
    pub features: Features,
    /// Native rate of the captured audio
    pub original_sample_rate: u32,
    /// True when the capture was already single-channel
    pub is_mono: bool,
}
