// Pipeline error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Pipeline error code constants
///
/// Single source of truth for the numeric codes reported by [`PipelineError`]
/// and surfaced through telemetry and the CLI exit path.
///
/// Error code range: 1001-1007
pub struct PipelineErrorCodes;

impl PipelineErrorCodes {
    /// Audio source cannot be opened or access was denied
    pub const SOURCE_UNAVAILABLE: i32 = 1001;

    /// Source-encoded audio could not be decoded to linear samples
    pub const DECODE_FAILURE: i32 = 1002;

    /// Configuration value rejected at configuration time
    pub const CONFIGURATION_INVALID: i32 = 1003;

    /// Engine is already running
    pub const ALREADY_RUNNING: i32 = 1004;

    /// Engine is not running
    pub const NOT_RUNNING: i32 = 1005;

    /// Live stream disconnected or an internal channel closed unexpectedly
    pub const STREAM_FAILURE: i32 = 1006;

    /// External consumer refused a threshold event
    pub const DISPATCH_FAILED: i32 = 1007;
}

/// Log a pipeline error with structured context
///
/// This function logs errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - context: Where the error surfaced
/// - message: Human-readable error message
pub fn log_pipeline_error(err: &PipelineError, context: &str) {
    error!(
        "Pipeline error in {}: code={}, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors produced by the capture pipeline
///
/// Silent or zero-length audio is never represented here: those inputs have
/// defined-value policies in the encoder and feature extractor.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Audio source cannot be opened (no device, permission denied)
    SourceUnavailable { reason: String },

    /// Source-encoded audio could not be decoded
    DecodeFailure { reason: String },

    /// Configuration value out of range
    ConfigurationInvalid { field: String, reason: String },

    /// Engine already running. Call stop() first.
    AlreadyRunning,

    /// Engine not running
    NotRunning,

    /// Stream disconnected or internal channel closed
    StreamFailure { reason: String },

    /// Consumer rejected an event
    DispatchFailed { reason: String },
}

impl PipelineError {
    /// Shorthand for building a [`PipelineError::ConfigurationInvalid`]
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::ConfigurationInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Fatal errors end the current session attempt; callers may retry by
    /// re-requesting access to the source.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::SourceUnavailable { .. })
    }
}

impl ErrorCode for PipelineError {
    fn code(&self) -> i32 {
        match self {
            PipelineError::SourceUnavailable { .. } => PipelineErrorCodes::SOURCE_UNAVAILABLE,
            PipelineError::DecodeFailure { .. } => PipelineErrorCodes::DECODE_FAILURE,
            PipelineError::ConfigurationInvalid { .. } => {
                PipelineErrorCodes::CONFIGURATION_INVALID
            }
            PipelineError::AlreadyRunning => PipelineErrorCodes::ALREADY_RUNNING,
            PipelineError::NotRunning => PipelineErrorCodes::NOT_RUNNING,
            PipelineError::StreamFailure { .. } => PipelineErrorCodes::STREAM_FAILURE,
            PipelineError::DispatchFailed { .. } => PipelineErrorCodes::DISPATCH_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            PipelineError::SourceUnavailable { reason } => {
                format!("Audio source unavailable: {}", reason)
            }
            PipelineError::DecodeFailure { reason } => {
                format!("Failed to decode source audio: {}", reason)
            }
            PipelineError::ConfigurationInvalid { field, reason } => {
                format!("Invalid configuration for {}: {}", field, reason)
            }
            PipelineError::AlreadyRunning => {
                "Capture engine already running. Call stop() first.".to_string()
            }
            PipelineError::NotRunning => {
                "Capture engine not running. Call start() first.".to_string()
            }
            PipelineError::StreamFailure { reason } => {
                format!("Audio stream failure: {}", reason)
            }
            PipelineError::DispatchFailed { reason } => {
                format!("Failed to deliver threshold event: {}", reason)
            }
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PipelineError::{} (code {}): {}",
            self.variant_name(),
            self.code(),
            self.message()
        )
    }
}

impl PipelineError {
    fn variant_name(&self) -> &'static str {
        match self {
            PipelineError::SourceUnavailable { .. } => "SourceUnavailable",
            PipelineError::DecodeFailure { .. } => "DecodeFailure",
            PipelineError::ConfigurationInvalid { .. } => "ConfigurationInvalid",
            PipelineError::AlreadyRunning => "AlreadyRunning",
            PipelineError::NotRunning => "NotRunning",
            PipelineError::StreamFailure { .. } => "StreamFailure",
            PipelineError::DispatchFailed { .. } => "DispatchFailed",
        }
    }
}

impl std::error::Error for PipelineError {}

/// Convert from std::io::Error to PipelineError
impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::StreamFailure {
            reason: err.to_string(),
        }
    }
}

/// Convert from hound::Error to PipelineError
impl From<hound::Error> for PipelineError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(io) => PipelineError::from(io),
            other => PipelineError::DecodeFailure {
                reason: other.to_string(),
            },
        }
    }
}
