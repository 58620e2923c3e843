//! Configuration management for the capture pipeline
//!
//! This module provides runtime configuration loading from JSON files so the
//! trigger threshold, analysis cadence and output selection can be tuned
//! without recompilation. Values are validated once, up front: the analyzer
//! and resampler never see an out-of-range window size or sample rate.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::PipelineError;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

/// Threshold trigger parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Loudness threshold in decibels (compared against the tick amplitude)
    pub threshold_db: i32,
    /// Minimum spacing between externally visible notifications
    pub cooldown_ms: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            threshold_db: -30,
            cooldown_ms: 1000,
        }
    }
}

/// Spectral analyzer parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Transform window size in samples (power of two)
    pub window_size: usize,
    /// Temporal smoothing between consecutive snapshots (0 = none, 1 = frozen)
    pub smoothing: f32,
    /// Lower clamp for amplitude readings
    pub floor_db: f32,
    /// Bin magnitudes at or below this level map to 0
    pub min_decibels: f32,
    /// Bin magnitudes at or above this level map to the maximum (1.0)
    pub max_decibels: f32,
    /// Analysis cadence; 16 ms approximates one display refresh
    pub tick_interval_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_size: 256,
            smoothing: 0.8,
            floor_db: -60.0,
            min_decibels: -100.0,
            max_decibels: -30.0,
            tick_interval_ms: 16,
        }
    }
}

/// Spectral feature algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureMode {
    /// Hann-windowed FFT over the feature window
    #[default]
    Fft,
    /// Sample-index proxies for centroid/rolloff; inexpensive, not a transform
    Approximate,
}

/// Capture, post-processing and output parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Sample rate of the feature set handed to the classifier
    pub target_sample_rate: u32,
    /// Capacity of the source → analysis queue, in chunks
    pub queue_capacity: usize,
    /// Spectral centroid/rolloff algorithm
    #[serde(default)]
    pub feature_mode: FeatureMode,
    /// Attach the canonical WAV artifact to each event
    pub emit_artifact: bool,
    /// Attach the feature set to each event
    pub emit_features: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16_000,
            queue_capacity: 64,
            feature_mode: FeatureMode::Fft,
            emit_artifact: true,
            emit_features: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// Loaded configuration; if the file doesn't exist or the JSON is invalid,
    /// the defaults are returned and a warning is logged.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Reject values the analyzer, resampler or dispatcher cannot honour.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.analysis.validate()?;
        self.capture.validate()
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.window_size < 2 || !self.window_size.is_power_of_two() {
            return Err(PipelineError::config(
                "analysis.window_size",
                format!("must be a power of two >= 2 (got {})", self.window_size),
            ));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(PipelineError::config(
                "analysis.smoothing",
                format!("must be within [0, 1] (got {})", self.smoothing),
            ));
        }
        if !self.min_decibels.is_finite()
            || !self.max_decibels.is_finite()
            || self.min_decibels >= self.max_decibels
        {
            return Err(PipelineError::config(
                "analysis.min_decibels",
                format!(
                    "must be below max_decibels (got {} >= {})",
                    self.min_decibels, self.max_decibels
                ),
            ));
        }
        if !self.floor_db.is_finite() {
            return Err(PipelineError::config("analysis.floor_db", "must be finite"));
        }
        if self.tick_interval_ms == 0 {
            return Err(PipelineError::config(
                "analysis.tick_interval_ms",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.target_sample_rate == 0 {
            return Err(PipelineError::config(
                "capture.target_sample_rate",
                "must be greater than 0",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(PipelineError::config(
                "capture.queue_capacity",
                "must be greater than 0",
            ));
        }
        if !self.emit_artifact && !self.emit_features {
            return Err(PipelineError::config(
                "capture.emit_artifact",
                "at least one of emit_artifact / emit_features must be enabled",
            ));
        }
        Ok(())
    }
}
