// Codec module - canonical WAV artifacts and source-container decoding

pub mod decode;
pub mod wav;

pub use decode::{AudioDecoder, DecodedAudio, PcmDecoder, SourceFormat};
pub use wav::{encode_wav, pcm16_from_f32, WAV_HEADER_LEN};

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Whether an artifact holds canonical PCM or the untouched source bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactKind {
    /// 44-byte header + 16-bit little-endian PCM
    CanonicalPcm,
    /// Decoding failed; bytes are the original container, unmodified
    Passthrough { format: SourceFormat },
}

/// Immutable container bytes plus declared rate and channel count.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedArtifact {
    bytes: Vec<u8>,
    sample_rate: u32,
    channels: u16,
    kind: ArtifactKind,
}

impl EncodedArtifact {
    /// Encode interleaved samples into a canonical artifact.
    pub fn canonical(
        samples: &[f32],
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            bytes: encode_wav(samples, sample_rate, channels)?,
            sample_rate,
            channels,
            kind: ArtifactKind::CanonicalPcm,
        })
    }

    /// Wrap undecodable source bytes as-is.
    pub fn passthrough(bytes: Vec<u8>, sample_rate: u32, channels: u16) -> Self {
        let format = SourceFormat::detect(&bytes);
        Self {
            bytes,
            sample_rate,
            channels,
            kind: ArtifactKind::Passthrough { format },
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn is_canonical(&self) -> bool {
        self.kind == ArtifactKind::CanonicalPcm
    }
}
