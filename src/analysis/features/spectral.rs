// Spectral module - Frequency-domain feature extraction
//
// Two families of centroid/rolloff live here:
// - SpectralFeatures: computed from a real FFT magnitude spectrum
// - approximate_*: inexpensive sample-index proxies. These are NOT spectral
//   transforms; each sample index i in the window is treated as if it were a
//   frequency bin at i * sample_rate / window_size and weighted by |sample|.
//
// Both families return 0 Hz centroid and Nyquist rolloff for silent input.
//
// References:
// - Peeters, G. (2004). A large set of audio features for sound description
// - Lerch, A. (2012). An Introduction to Audio Content Analysis

/// Spectral rolloff threshold (85% of spectral energy)
pub const ROLLOFF_THRESHOLD: f32 = 0.85;

/// Maximum window used by both families
pub const FEATURE_WINDOW: usize = 1024;

/// FFT-based spectral feature computation
pub struct SpectralFeatures {
    sample_rate: u32,
    fft_size: usize,
}

impl SpectralFeatures {
    /// Create a new spectral features processor
    ///
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `fft_size` - FFT window size
    pub fn new(sample_rate: u32, fft_size: usize) -> Self {
        Self {
            sample_rate,
            fft_size,
        }
    }

    fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.fft_size as f32
    }

    fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    /// Compute spectral centroid (power-weighted mean frequency)
    ///
    /// Formula: centroid = Σ(f_i × |X[i]|²) / Σ|X[i]|²
    ///
    /// Power weighting keeps weak interpolation images produced by
    /// upsampling from dragging the centroid of a tonal signal.
    ///
    /// # Arguments
    /// * `spectrum` - Magnitude spectrum
    ///
    /// # Returns
    /// Spectral centroid in Hz, 0.0 for silence
    pub fn compute_centroid(&self, spectrum: &[f32]) -> f32 {
        let bin_width = self.bin_width();

        let (weighted_sum, power_sum) = spectrum.iter().enumerate().fold(
            (0.0f64, 0.0f64),
            |(weighted, total), (i, &mag)| {
                let power = (mag as f64) * (mag as f64);
                (weighted + i as f64 * bin_width as f64 * power, total + power)
            },
        );

        if power_sum > 1e-20 {
            (weighted_sum / power_sum) as f32
        } else {
            0.0
        }
    }

    /// Compute spectral rolloff (85% energy threshold frequency)
    ///
    /// # Arguments
    /// * `spectrum` - Magnitude spectrum
    ///
    /// # Returns
    /// Rolloff frequency in Hz, Nyquist for silence
    pub fn compute_rolloff(&self, spectrum: &[f32]) -> f32 {
        let total_energy: f64 = spectrum.iter().map(|&mag| (mag as f64) * (mag as f64)).sum();

        if total_energy < 1e-20 {
            return self.nyquist();
        }

        let threshold = ROLLOFF_THRESHOLD as f64 * total_energy;
        let bin_width = self.bin_width();

        let mut cumulative_energy = 0.0f64;
        for (i, &mag) in spectrum.iter().enumerate() {
            cumulative_energy += (mag as f64) * (mag as f64);
            if cumulative_energy >= threshold {
                return i as f32 * bin_width;
            }
        }

        self.nyquist()
    }
}

/// Approximate spectral centroid over the first `min(1024, len)` samples.
///
/// Formula: Σ(i × sample_rate / W × |s_i|) / Σ|s_i| with W the window length.
/// Returns 0.0 when the window carries no magnitude.
pub fn approximate_centroid(samples: &[f32], sample_rate: u32) -> f32 {
    let window = &samples[..samples.len().min(FEATURE_WINDOW)];
    if window.is_empty() {
        return 0.0;
    }
    let bin_width = sample_rate as f64 / window.len() as f64;

    let (weighted_sum, magnitude_sum) =
        window
            .iter()
            .enumerate()
            .fold((0.0f64, 0.0f64), |(weighted, total), (i, &s)| {
                let magnitude = s.abs() as f64;
                (weighted + i as f64 * bin_width * magnitude, total + magnitude)
            });

    if magnitude_sum > 0.0 {
        (weighted_sum / magnitude_sum) as f32
    } else {
        0.0
    }
}

/// Approximate spectral rolloff over the first `min(1024, len)` samples.
///
/// Returns the frequency of the smallest index at which cumulative squared
/// magnitude reaches 85% of the window's energy, or Nyquist on silence.
pub fn approximate_rolloff(samples: &[f32], sample_rate: u32) -> f32 {
    let nyquist = sample_rate as f32 / 2.0;
    let window = &samples[..samples.len().min(FEATURE_WINDOW)];
    let total_energy: f64 = window.iter().map(|&s| (s as f64) * (s as f64)).sum();
    if total_energy <= 0.0 {
        return nyquist;
    }

    let threshold = ROLLOFF_THRESHOLD as f64 * total_energy;
    let bin_width = sample_rate as f64 / window.len() as f64;

    let mut cumulative_energy = 0.0f64;
    for (i, &s) in window.iter().enumerate() {
        cumulative_energy += (s as f64) * (s as f64);
        if cumulative_energy >= threshold {
            return (i as f64 * bin_width) as f32;
        }
    }
    nyquist
}
