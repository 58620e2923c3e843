// Decoder interface - source-encoded containers to linear samples
//
// Sources that hand over recorder blobs (rather than raw frames) are decoded
// here before canonical re-encoding. Only RIFF/WAVE is decoded natively; Opus
// containers and anything unrecognised fail with DecodeFailure so the caller
// can fall back to passing the original bytes through.

use std::io::Cursor;

use serde::{Deserialize, Serialize};

use crate::audio::frame::StreamFormat;
use crate::error::PipelineError;

/// Container family detected from leading magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// RIFF/WAVE
    NativeWav,
    /// Ogg or Matroska/WebM, as produced by typical recorders
    OpusContainer,
    Unknown,
}

impl SourceFormat {
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            SourceFormat::NativeWav
        } else if bytes.starts_with(b"OggS") || bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            SourceFormat::OpusContainer
        } else {
            SourceFormat::Unknown
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SourceFormat::NativeWav => "native_wav",
            SourceFormat::OpusContainer => "opus_container",
            SourceFormat::Unknown => "unknown",
        }
    }
}

/// Linear samples recovered from a container.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Interleaved samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    pub format: StreamFormat,
}

/// Decodes container bytes to linear PCM.
pub trait AudioDecoder: Send {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio, PipelineError>;
}

/// Built-in decoder for uncompressed and float WAV.
#[derive(Debug, Default, Clone, Copy)]
pub struct PcmDecoder;

impl AudioDecoder for PcmDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio, PipelineError> {
        match SourceFormat::detect(bytes) {
            SourceFormat::NativeWav => decode_wav(bytes),
            SourceFormat::OpusContainer => Err(PipelineError::DecodeFailure {
                reason: "Opus containers are not supported by the PCM decoder".to_string(),
            }),
            SourceFormat::Unknown => Err(PipelineError::DecodeFailure {
                reason: format!("unrecognised container ({} bytes)", bytes.len()),
            }),
        }
    }
}

fn decode_failure(err: hound::Error) -> PipelineError {
    PipelineError::DecodeFailure {
        reason: err.to_string(),
    }
}

fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio, PipelineError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes)).map_err(decode_failure)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(decode_failure)?,
        hound::SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(PipelineError::DecodeFailure {
                    reason: format!("unsupported bit depth {}", spec.bits_per_sample),
                });
            }
            let scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(decode_failure)?
        }
    };

    Ok(DecodedAudio {
        samples,
        format: StreamFormat::new(spec.sample_rate, spec.channels),
    })
}
