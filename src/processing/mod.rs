// Post-processing - closed capture session → threshold event
//
// Runs off the analysis thread. For each session:
// 1. Recover linear samples (PCM frames as-is, encoded chunks via the decoder)
// 2. Canonical WAV artifact at the native rate (>2 channels downmixed first)
// 3. Mono downmix → linear resample to the target rate → feature set
//
// Sessions holding source-encoded bytes are decoded and packaged from those.
// Undecodable bytes still produce an event: they are passed through as a
// non-canonical artifact, and features come from the session's PCM frames
// when it has any.

pub mod resample;

pub use resample::{downmix_to_mono, resample_linear, resampled_len};

use crate::analysis::features::{FeatureExtractor, FeatureSet};
use crate::audio::frame::{ChunkKind, StreamFormat};
use crate::capture::CaptureSession;
use crate::codec::{AudioDecoder, EncodedArtifact, PcmDecoder, SourceFormat};
use crate::config::CaptureConfig;
use crate::dispatch::ThresholdEvent;
use crate::error::{log_pipeline_error, PipelineError};
use crate::telemetry;

pub struct SessionProcessor {
    emit_artifact: bool,
    emit_features: bool,
    target_sample_rate: u32,
    extractor: FeatureExtractor,
    decoder: Box<dyn AudioDecoder>,
}

impl SessionProcessor {
    pub fn new(config: &CaptureConfig) -> Self {
        Self::with_decoder(config, Box::new(PcmDecoder))
    }

    /// Use a custom decoder for encoded sessions (e.g. one that handles Opus).
    pub fn with_decoder(config: &CaptureConfig, decoder: Box<dyn AudioDecoder>) -> Self {
        Self {
            emit_artifact: config.emit_artifact,
            emit_features: config.emit_features,
            target_sample_rate: config.target_sample_rate,
            extractor: FeatureExtractor::new(config.target_sample_rate, config.feature_mode),
            decoder,
        }
    }

    /// Package one closed session. Never fails: errors degrade the output.
    pub fn process(&self, session: CaptureSession) -> ThresholdEvent {
        let trigger = session.trigger();
        let mut event = ThresholdEvent {
            session_id: session.id(),
            timestamp_ms: session.started_at_ms(),
            closed_at_ms: session.closed_at_ms().unwrap_or(session.started_at_ms()),
            amplitude_db: trigger.amplitude_db,
            frequency_hz: trigger.frequency_hz,
            encoded_artifact: None,
            feature_set: None,
        };

        // Source-encoded bytes win over the analysed PCM frames when present
        let bytes = session.encoded_bytes();
        let (samples, format) = if bytes.is_empty() {
            (session.pcm_samples(), session.format())
        } else {
            match self.decoder.decode(&bytes) {
                Ok(decoded) => (decoded.samples, decoded.format),
                Err(err) => {
                    let format = SourceFormat::detect(&bytes);
                    tracing::warn!(
                        "[SessionProcessor] Session {}: {} ({} bytes), passing original bytes through",
                        event.session_id,
                        err,
                        bytes.len()
                    );
                    telemetry::hub().record_decode_fallback(
                        event.session_id,
                        format.name(),
                        err.to_string(),
                    );
                    let declared = session.format();
                    event.encoded_artifact = Some(EncodedArtifact::passthrough(
                        bytes,
                        declared.sample_rate,
                        declared.channels,
                    ));
                    if self.emit_features && session.holds(ChunkKind::Pcm) {
                        event.feature_set =
                            self.features(event.session_id, &session.pcm_samples(), declared);
                    }
                    return event;
                }
            }
        };

        if self.emit_artifact {
            event.encoded_artifact = self.encode(event.session_id, &samples, format);
        }
        if self.emit_features {
            event.feature_set = self.features(event.session_id, &samples, format);
        }

        tracing::debug!(
            "[SessionProcessor] Session {}: {} samples @ {} Hz x{}",
            event.session_id,
            samples.len(),
            format.sample_rate,
            format.channels
        );
        event
    }

    fn encode(
        &self,
        session_id: u64,
        samples: &[f32],
        format: StreamFormat,
    ) -> Option<EncodedArtifact> {
        let result = if format.channels > crate::codec::wav::MAX_CHANNELS {
            let mono = downmix_to_mono(samples, format.channels);
            EncodedArtifact::canonical(&mono, format.sample_rate, 1)
        } else {
            EncodedArtifact::canonical(samples, format.sample_rate, format.channels.max(1))
        };

        result
            .map_err(|err| {
                log_pipeline_error(&err, &format!("encode session {}", session_id));
                telemetry::hub().record_error(&err, "encode");
            })
            .ok()
    }

    fn features(
        &self,
        session_id: u64,
        samples: &[f32],
        format: StreamFormat,
    ) -> Option<FeatureSet> {
        let mono = downmix_to_mono(samples, format.channels);
        let resampled: Result<_, PipelineError> =
            resample_linear(&mono, format.sample_rate, self.target_sample_rate);

        match resampled {
            Ok(resampled) => Some(self.extractor.build_feature_set(
                &resampled,
                format.sample_rate,
                format.channels <= 1,
            )),
            Err(err) => {
                log_pipeline_error(&err, &format!("resample session {}", session_id));
                telemetry::hub().record_error(&err, "resample");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::spectrum::AmplitudeReading;
    use crate::audio::frame::{AudioChunk, AudioFrame};
    use crate::capture::CaptureBuffer;
    use crate::codec::{encode_wav, ArtifactKind};
    use crate::config::FeatureMode;

    fn reading() -> AmplitudeReading {
        AmplitudeReading {
            amplitude_db: -18.0,
            frequency_hz: 218.75,
        }
    }

    fn session(format: StreamFormat, chunks: Vec<AudioChunk>) -> CaptureSession {
        let mut buffer = CaptureBuffer::new();
        buffer.open(5_000, reading(), format);
        for chunk in chunks {
            buffer.append(chunk);
        }
        buffer.close(5_500).unwrap()
    }

    #[test]
    fn test_pcm_session_produces_artifact_and_features() {
        let processor = SessionProcessor::new(&CaptureConfig::default());
        let samples: Vec<f32> = (0..800).map(|i| ((i as f32) * 0.3).sin() * 0.4).collect();
        let event = processor.process(session(
            StreamFormat::mono(8_000),
            vec![
                AudioChunk::Pcm(AudioFrame::mono(samples[..400].to_vec(), 8_000)),
                AudioChunk::Pcm(AudioFrame::mono(samples[400..].to_vec(), 8_000)),
            ],
        ));

        assert_eq!(event.session_id, 1);
        assert_eq!(event.timestamp_ms, 5_000);
        assert_eq!(event.closed_at_ms, 5_500);
        assert_eq!(event.amplitude_db, -18.0);

        let artifact = event.encoded_artifact.unwrap();
        assert!(artifact.is_canonical());
        assert_eq!(artifact.sample_rate(), 8_000);
        assert_eq!(artifact.bytes().len(), 44 + 2 * 800);

        let features = event.feature_set.unwrap();
        assert_eq!(features.sample_rate, 16_000);
        assert_eq!(features.samples.len(), 1_600);
        assert_eq!(features.original_sample_rate, 8_000);
        assert!(features.is_mono);
        assert!((features.duration_s - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_empty_session_still_packaged() {
        let processor = SessionProcessor::new(&CaptureConfig::default());
        let event = processor.process(session(StreamFormat::mono(48_000), vec![]));

        let artifact = event.encoded_artifact.unwrap();
        assert_eq!(artifact.bytes().len(), 44);
        let features = event.feature_set.unwrap();
        assert!(features.samples.is_empty());
        assert_eq!(features.features.spectral_rolloff, 8_000.0);
    }

    #[test]
    fn test_stereo_session_keeps_channels_in_artifact_and_downmixes_features() {
        let processor = SessionProcessor::new(&CaptureConfig::default());
        let interleaved = vec![0.2, 0.4, -0.2, -0.4, 0.6, 0.2, 0.0, 0.0];
        let event = processor.process(session(
            StreamFormat::new(16_000, 2),
            vec![AudioChunk::Pcm(AudioFrame::new(interleaved, 16_000, 2))],
        ));

        assert_eq!(event.encoded_artifact.unwrap().channels(), 2);
        let features = event.feature_set.unwrap();
        assert!(!features.is_mono);
        assert_eq!(features.samples.len(), 4);
        // Mono = [0.3, -0.3, 0.4, 0.0], normalized by 0.95 / 0.4
        assert!((features.samples[2] - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_multichannel_artifact_is_downmixed() {
        let processor = SessionProcessor::new(&CaptureConfig::default());
        let event = processor.process(session(
            StreamFormat::new(16_000, 4),
            vec![AudioChunk::Pcm(AudioFrame::new(vec![0.1; 16], 16_000, 4))],
        ));
        let artifact = event.encoded_artifact.unwrap();
        assert_eq!(artifact.channels(), 1);
        assert_eq!(artifact.bytes().len(), 44 + 2 * 4);
    }

    #[test]
    fn test_encoded_wav_session_is_decoded() {
        let processor = SessionProcessor::new(&CaptureConfig::default());
        let wav = encode_wav(&[0.25; 320], 32_000, 1).unwrap();
        let (head, tail) = wav.split_at(100);
        let event = processor.process(session(
            StreamFormat::mono(48_000),
            vec![
                AudioChunk::Encoded(head.to_vec()),
                AudioChunk::Encoded(tail.to_vec()),
            ],
        ));

        let artifact = event.encoded_artifact.unwrap();
        assert!(artifact.is_canonical());
        assert_eq!(artifact.sample_rate(), 32_000);
        assert_eq!(event.feature_set.unwrap().samples.len(), 160);
    }

    #[test]
    fn test_undecodable_session_passes_bytes_through() {
        let processor = SessionProcessor::new(&CaptureConfig::default());
        let blob = b"OggS\x00\x02OpusHead-not-really".to_vec();
        let event = processor.process(session(
            StreamFormat::mono(48_000),
            vec![AudioChunk::Encoded(blob.clone())],
        ));

        let artifact = event.encoded_artifact.unwrap();
        assert_eq!(
            artifact.kind(),
            ArtifactKind::Passthrough {
                format: SourceFormat::OpusContainer
            }
        );
        assert_eq!(artifact.bytes(), blob.as_slice());
        assert!(event.feature_set.is_none());
    }

    #[test]
    fn test_encoded_bytes_preferred_over_pcm_frames() {
        let processor = SessionProcessor::new(&CaptureConfig::default());
        let wav = encode_wav(&[0.5; 640], 32_000, 1).unwrap();
        let (head, tail) = wav.split_at(60);
        let event = processor.process(session(
            StreamFormat::mono(8_000),
            vec![
                AudioChunk::Pcm(AudioFrame::mono(vec![0.1; 80], 8_000)),
                AudioChunk::Encoded(head.to_vec()),
                AudioChunk::Pcm(AudioFrame::mono(vec![0.1; 80], 8_000)),
                AudioChunk::Encoded(tail.to_vec()),
            ],
        ));

        let artifact = event.encoded_artifact.unwrap();
        assert!(artifact.is_canonical());
        assert_eq!(artifact.sample_rate(), 32_000);
        assert_eq!(artifact.bytes().len(), 44 + 2 * 640);
        assert_eq!(event.feature_set.unwrap().samples.len(), 320);
    }

    #[test]
    fn test_undecodable_bytes_keep_pcm_features() {
        let processor = SessionProcessor::new(&CaptureConfig::default());
        let blob = b"\x1a\x45\xdf\xa3webm-cluster".to_vec();
        let event = processor.process(session(
            StreamFormat::mono(8_000),
            vec![
                AudioChunk::Pcm(AudioFrame::mono(vec![0.2, -0.2, 0.2, -0.2], 8_000)),
                AudioChunk::Encoded(blob.clone()),
            ],
        ));

        let artifact = event.encoded_artifact.unwrap();
        assert!(!artifact.is_canonical());
        assert_eq!(artifact.bytes(), blob.as_slice());
        let features = event.feature_set.unwrap();
        assert_eq!(features.original_sample_rate, 8_000);
        assert_eq!(features.samples.len(), 8);
    }

    #[test]
    fn test_output_selection() {
        let config = CaptureConfig {
            emit_artifact: false,
            feature_mode: FeatureMode::Approximate,
            ..CaptureConfig::default()
        };
        let processor = SessionProcessor::new(&config);
        let event = processor.process(session(
            StreamFormat::mono(16_000),
            vec![AudioChunk::Pcm(AudioFrame::mono(vec![0.1, -0.1], 16_000))],
        ));
        assert!(event.encoded_artifact.is_none());
        assert!(event.feature_set.is_some());
    }
}
