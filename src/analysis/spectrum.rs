// Spectral analyzer - periodic magnitude snapshots of the live signal
//
// Each tick transforms the most recent `window_size` mono samples and keeps
// `window_size / 2` bins. Bin values follow the usual analyser-node shape:
//
//   |X[k]| / N  →  temporal smoothing  →  dB  →  linear map of
//   [min_decibels, max_decibels] onto [0, 1]
//
// so the largest possible bin value is 1.0. Amplitude readings are derived
// from the mean of those bins; they are a display/trigger heuristic, not a
// calibrated loudness model.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::analysis::features::fft::FftProcessor;
use crate::config::AnalysisConfig;
use crate::error::PipelineError;

/// Largest value a scaled bin can take
pub const MAX_BIN_MAGNITUDE: f32 = 1.0;

/// One transform of the analysis window; recomputed every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumSnapshot {
    bins: Vec<f32>,
    sample_rate: u32,
    window_size: usize,
}

impl SpectrumSnapshot {
    /// Scaled, non-negative bin magnitudes (`window_size / 2` of them)
    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// `20 * log10(mean(bins) / max)`, clamped below at `floor_db`.
    pub fn amplitude_db(&self, floor_db: f32) -> f32 {
        if self.bins.is_empty() {
            return floor_db;
        }
        let mean = self.bins.iter().sum::<f32>() / self.bins.len() as f32;
        let db = 20.0 * (mean / MAX_BIN_MAGNITUDE).log10();
        if db.is_finite() {
            db.max(floor_db)
        } else {
            floor_db
        }
    }

    /// First bin holding the maximum magnitude.
    pub fn dominant_bin(&self) -> usize {
        let mut max_index = 0;
        let mut max_value = f32::MIN;
        for (i, &value) in self.bins.iter().enumerate() {
            if value > max_value {
                max_value = value;
                max_index = i;
            }
        }
        max_index
    }

    /// Dominant bin converted to Hz as `bin * sample_rate / (2 * N)`.
    pub fn dominant_frequency_hz(&self) -> f32 {
        self.dominant_bin() as f32 * self.sample_rate as f32 / (2 * self.window_size) as f32
    }
}

/// Scalar result of one analysis tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmplitudeReading {
    pub amplitude_db: f32,
    pub frequency_hz: f32,
}

/// Streaming analyzer fed with mono samples between ticks.
pub struct SpectralAnalyzer {
    fft: FftProcessor,
    sample_rate: u32,
    window_size: usize,
    smoothing: f32,
    floor_db: f32,
    min_decibels: f32,
    max_decibels: f32,
    history: VecDeque<f32>,
    smoothed: Vec<f32>,
    peak_db: f32,
}

impl SpectralAnalyzer {
    /// Create an analyzer for a stream at `sample_rate`.
    ///
    /// Fails with `ConfigurationInvalid` when the window is not a power of two
    /// or the sample rate is zero.
    pub fn new(config: &AnalysisConfig, sample_rate: u32) -> Result<Self, PipelineError> {
        config.validate()?;
        if sample_rate == 0 {
            return Err(PipelineError::config(
                "sample_rate",
                "stream sample rate must be greater than 0",
            ));
        }

        let window_size = config.window_size;
        Ok(Self {
            fft: FftProcessor::new(window_size),
            sample_rate,
            window_size,
            smoothing: config.smoothing,
            floor_db: config.floor_db,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            history: VecDeque::from(vec![0.0; window_size]),
            smoothed: vec![0.0; window_size / 2],
            peak_db: config.floor_db,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn floor_db(&self) -> f32 {
        self.floor_db
    }

    /// Append mono samples; only the most recent `window_size` are kept.
    pub fn push_samples(&mut self, samples: &[f32]) {
        for &sample in samples {
            if self.history.len() == self.window_size {
                self.history.pop_front();
            }
            self.history
                .push_back(if sample.is_finite() { sample } else { 0.0 });
        }
    }

    /// Transform the current window and update the smoothed bins.
    pub fn snapshot(&mut self) -> SpectrumSnapshot {
        let window: Vec<f32> = self.history.iter().copied().collect();
        let spectrum = self.fft.compute_magnitude_spectrum(&window);
        let scale = 1.0 / self.window_size as f32;
        let range = self.max_decibels - self.min_decibels;

        let bins = self
            .smoothed
            .iter_mut()
            .zip(&spectrum)
            .map(|(previous, &magnitude)| {
                let mut value =
                    self.smoothing * *previous + (1.0 - self.smoothing) * magnitude * scale;
                if !value.is_finite() {
                    value = 0.0;
                }
                *previous = value;

                let db = 20.0 * value.log10();
                ((db - self.min_decibels) / range).clamp(0.0, MAX_BIN_MAGNITUDE)
            })
            .collect();

        SpectrumSnapshot {
            bins,
            sample_rate: self.sample_rate,
            window_size: self.window_size,
        }
    }

    /// Produce the tick's amplitude/frequency reading and update the peak.
    pub fn tick(&mut self) -> AmplitudeReading {
        let snapshot = self.snapshot();
        let reading = AmplitudeReading {
            amplitude_db: snapshot.amplitude_db(self.floor_db),
            frequency_hz: snapshot.dominant_frequency_hz(),
        };
        self.peak_db = self.peak_db.max(reading.amplitude_db);
        reading
    }

    /// Running maximum amplitude for display; never used for triggering.
    pub fn peak_db(&self) -> f32 {
        self.peak_db
    }

    /// Forget history, smoothing state and peak.
    pub fn reset(&mut self) {
        self.history.iter_mut().for_each(|s| *s = 0.0);
        self.smoothed.iter_mut().for_each(|b| *b = 0.0);
        self.peak_db = self.floor_db;
    }
}
