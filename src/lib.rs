// Bark Capture Core - threshold-triggered audio capture
// Real-time level analysis with lock-free source hand-off, canonical WAV
// packaging and classifier feature extraction per captured session

// Module declarations
pub mod analysis;
pub mod audio;
pub mod capture;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod processing;
pub mod telemetry;

// Re-exports for convenience
pub use analysis::features::{FeatureExtractor, FeatureSet, Features};
pub use analysis::{AudioMetrics, TriggerNotification, TriggerState};
pub use audio::{
    AudioFrame, AudioSource, Pacing, StreamFormat, SyntheticSegment, SyntheticSource, WavFileSource,
};
pub use capture::{CaptureBuffer, CaptureSession};
pub use codec::{encode_wav, EncodedArtifact};
pub use config::{AppConfig, FeatureMode};
pub use dispatch::{DirectoryConsumer, EventConsumer, ThresholdEvent};
pub use engine::EngineHandle;
pub use error::{ErrorCode, PipelineError};
pub use processing::{resample_linear, SessionProcessor};
