// Threshold event - output record handed to the external consumer

use serde::{Deserialize, Serialize};

use crate::analysis::features::FeatureSet;
use crate::codec::{ArtifactKind, EncodedArtifact};

/// One closed capture session, packaged for delivery.
///
/// The artifact keeps the native capture rate; the feature set carries the
/// target rate. Either may be absent depending on configuration (and the
/// feature set is absent when the source bytes could not be decoded).
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdEvent {
    pub session_id: u64,
    /// Trigger time (unix milliseconds)
    pub timestamp_ms: u64,
    pub closed_at_ms: u64,
    pub amplitude_db: f32,
    pub frequency_hz: f32,
    pub encoded_artifact: Option<EncodedArtifact>,
    pub feature_set: Option<FeatureSet>,
}

/// JSON-friendly view of an event: artifact metadata instead of raw bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub session_id: u64,
    pub timestamp_ms: u64,
    pub closed_at_ms: u64,
    pub amplitude_db: f32,
    pub frequency_hz: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_set: Option<FeatureSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub byte_len: usize,
    pub sample_rate: u32,
    pub channels: u16,
    #[serde(flatten)]
    pub kind: ArtifactKind,
}

impl ThresholdEvent {
    pub fn summary(&self) -> EventSummary {
        EventSummary {
            session_id: self.session_id,
            timestamp_ms: self.timestamp_ms,
            closed_at_ms: self.closed_at_ms,
            amplitude_db: self.amplitude_db,
            frequency_hz: self.frequency_hz,
            artifact: self.encoded_artifact.as_ref().map(|artifact| ArtifactSummary {
                byte_len: artifact.bytes().len(),
                sample_rate: artifact.sample_rate(),
                channels: artifact.channels(),
                kind: artifact.kind(),
            }),
            feature_set: self.feature_set.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_describes_artifact() {
        let event = ThresholdEvent {
            session_id: 3,
            timestamp_ms: 1_700_000_000_000,
            closed_at_ms: 1_700_000_000_250,
            amplitude_db: -12.5,
            frequency_hz: 437.5,
            encoded_artifact: Some(EncodedArtifact::canonical(&[0.0; 10], 16_000, 1).unwrap()),
            feature_set: None,
        };

        let summary = event.summary();
        let artifact = summary.artifact.as_ref().unwrap();
        assert_eq!(artifact.byte_len, 64);
        assert_eq!(artifact.kind, ArtifactKind::CanonicalPcm);

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"kind\":\"canonical_pcm\""));
        assert!(!json.contains("feature_set"));
    }
}
