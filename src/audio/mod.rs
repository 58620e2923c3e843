// Audio module - frame types, the source queue and the audio sources

pub mod buffer_pool;
#[cfg(feature = "live-input")]
pub mod engine_cpal;
pub mod frame;
pub mod source;

// Re-export commonly used types for convenience
pub use buffer_pool::{EventQueue, EventReceiver, SourceSink, DEFAULT_QUEUE_CAPACITY};
#[cfg(feature = "live-input")]
pub use engine_cpal::CpalSource;
pub use frame::{AudioChunk, AudioFrame, ChunkKind, SourceEvent, StreamFormat};
pub use source::{AudioSource, Pacing, SyntheticSegment, SyntheticSource, WavFileSource};
