// Audio frame types shared by sources, the analyzer and the capture buffer

use serde::{Deserialize, Serialize};

/// Sample rate and channel layout of a stream or decoded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl StreamFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn mono(sample_rate: u32) -> Self {
        Self::new(sample_rate, 1)
    }
}

/// Interleaved block of linear samples in [-1.0, 1.0].
///
/// Immutable once produced by a source; the capture buffer stores frames by
/// value and the analyzer only reads them.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
    format: StreamFormat,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            format: StreamFormat::new(sample_rate, channels.max(1)),
        }
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(samples, sample_rate, 1)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.format.channels
    }

    /// Number of sample frames (one sample per channel).
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.format.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.format.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.format.sample_rate as f64
    }
}

/// One unit delivered by an audio source while a capture window is open.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioChunk {
    /// Linear PCM frame
    Pcm(AudioFrame),
    /// Fragment of a source-encoded container (e.g. a recorder blob)
    Encoded(Vec<u8>),
}

impl AudioChunk {
    pub fn kind(&self) -> ChunkKind {
        match self {
            AudioChunk::Pcm(_) => ChunkKind::Pcm,
            AudioChunk::Encoded(_) => ChunkKind::Encoded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Pcm,
    Encoded,
}

/// Event pushed by a source into the analysis queue.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// Live samples: analysed every tick and captured while a window is open
    Frame(AudioFrame),
    /// Container bytes: captured only, never analysed
    Encoded(Vec<u8>),
    /// Source finished (file exhausted) or disconnected
    EndOfStream,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count_and_duration() {
        let frame = AudioFrame::new(vec![0.0; 960], 48_000, 2);
        assert_eq!(frame.frame_count(), 480);
        assert!((frame.duration_secs() - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_zero_channels_is_treated_as_mono() {
        let frame = AudioFrame::new(vec![0.5; 4], 8_000, 0);
        assert_eq!(frame.channels(), 1);
        assert_eq!(frame.frame_count(), 4);
    }

    #[test]
    fn test_chunk_kind() {
        assert_eq!(
            AudioChunk::Pcm(AudioFrame::mono(vec![], 8_000)).kind(),
            ChunkKind::Pcm
        );
        assert_eq!(AudioChunk::Encoded(vec![1, 2]).kind(), ChunkKind::Encoded);
    }
}
