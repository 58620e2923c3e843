// FFT module - Fast Fourier Transform computation
//
// This module handles FFT computation with Hann windowing to reduce spectral
// leakage. The same processor backs the live spectral analyzer (small window,
// every tick) and the post-capture feature extractor (1024-point window).

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// FFT window size for feature extraction
pub const FFT_SIZE: usize = 1024;

/// FFT processor that computes magnitude spectra from audio windows
pub struct FftProcessor {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    /// Hann window for FFT (pre-computed)
    window: Vec<f32>,
}

impl FftProcessor {
    /// Create a new FFT processor
    ///
    /// # Arguments
    /// * `fft_size` - FFT window size (256 for live analysis, 1024 for features)
    pub fn new(fft_size: usize) -> Self {
        let window = hann_window(fft_size);
        let fft = FftPlanner::new().plan_fft_forward(fft_size);

        Self {
            fft,
            fft_size,
            window,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Compute magnitude spectrum using FFT
    ///
    /// Applies Hann windowing, zero-pads short input, performs the FFT and
    /// returns magnitudes for positive frequencies only.
    ///
    /// # Arguments
    /// * `audio` - Audio window; samples past `fft_size` are ignored
    ///
    /// # Returns
    /// Magnitude spectrum (size = fft_size / 2 + 1)
    pub fn compute_magnitude_spectrum(&self, audio: &[f32]) -> Vec<f32> {
        let audio = &audio[..audio.len().min(self.fft_size)];
        // Short input gets a taper of its own length before zero-padding
        let short_window;
        let window = if audio.len() < self.fft_size {
            short_window = hann_window(audio.len());
            &short_window
        } else {
            &self.window
        };

        let mut buffer: Vec<Complex<f32>> = audio
            .iter()
            .zip(window)
            .map(|(&sample, &w)| Complex::new(sample * w, 0.0))
            .collect();
        buffer.resize(self.fft_size, Complex::new(0.0, 0.0));

        self.fft.process(&mut buffer);

        buffer[..self.fft_size / 2 + 1]
            .iter()
            .map(|c| c.norm())
            .collect()
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| 0.5 * (1.0 - ((2.0 * std::f32::consts::PI * i as f32) / (size as f32 - 1.0)).cos()))
        .collect()
}
