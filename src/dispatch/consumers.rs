// Event consumers - where dispatched threshold events end up

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::dispatch::event::ThresholdEvent;
use crate::error::PipelineError;

/// Receives each threshold event exactly once, in session-close order.
pub trait EventConsumer: Send {
    fn deliver(&mut self, event: ThresholdEvent) -> Result<(), PipelineError>;
}

/// Forwards events into a tokio channel.
pub struct ChannelConsumer {
    tx: mpsc::UnboundedSender<ThresholdEvent>,
}

impl ChannelConsumer {
    pub fn new(tx: mpsc::UnboundedSender<ThresholdEvent>) -> Self {
        Self { tx }
    }

    /// Consumer plus the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ThresholdEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl EventConsumer for ChannelConsumer {
    fn deliver(&mut self, event: ThresholdEvent) -> Result<(), PipelineError> {
        self.tx
            .send(event)
            .map_err(|_| PipelineError::DispatchFailed {
                reason: "event receiver dropped".to_string(),
            })
    }
}

/// Writes `<id>.wav` (or `<id>.bin` for passthrough bytes) and `<id>.json`
/// for every event into a directory.
pub struct DirectoryConsumer {
    dir: PathBuf,
}

impl DirectoryConsumer {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|err| PipelineError::DispatchFailed {
            reason: format!("cannot create {}: {}", dir.display(), err),
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write(&self, name: String, contents: &[u8]) -> Result<(), PipelineError> {
        let path = self.dir.join(name);
        fs::write(&path, contents).map_err(|err| PipelineError::DispatchFailed {
            reason: format!("cannot write {}: {}", path.display(), err),
        })
    }
}

impl EventConsumer for DirectoryConsumer {
    fn deliver(&mut self, event: ThresholdEvent) -> Result<(), PipelineError> {
        let stem = format!("session-{:06}", event.session_id);

        if let Some(artifact) = event.encoded_artifact.as_ref() {
            let extension = if artifact.is_canonical() { "wav" } else { "bin" };
            self.write(format!("{stem}.{extension}"), artifact.bytes())?;
        }

        let json = serde_json::to_vec_pretty(&event.summary()).map_err(|err| {
            PipelineError::DispatchFailed {
                reason: format!("cannot serialize event {}: {}", event.session_id, err),
            }
        })?;
        self.write(format!("{stem}.json"), &json)
    }
}

impl EventConsumer for Vec<ThresholdEvent> {
    fn deliver(&mut self, event: ThresholdEvent) -> Result<(), PipelineError> {
        self.push(event);
        Ok(())
    }
}

/// Shared collector, readable while the engine still owns the consumer.
impl EventConsumer for Arc<Mutex<Vec<ThresholdEvent>>> {
    fn deliver(&mut self, event: ThresholdEvent) -> Result<(), PipelineError> {
        self.lock()
            .map_err(|_| PipelineError::DispatchFailed {
                reason: "collector lock poisoned".to_string(),
            })?
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::EncodedArtifact;

    fn event(session_id: u64, artifact: Option<EncodedArtifact>) -> ThresholdEvent {
        ThresholdEvent {
            session_id,
            timestamp_ms: 1_000,
            closed_at_ms: 1_100,
            amplitude_db: -20.0,
            frequency_hz: 250.0,
            encoded_artifact: artifact,
            feature_set: None,
        }
    }

    #[test]
    fn test_channel_consumer_forwards_and_detects_drop() {
        let (mut consumer, mut rx) = ChannelConsumer::channel();
        consumer.deliver(event(1, None)).unwrap();
        assert_eq!(rx.try_recv().unwrap().session_id, 1);

        drop(rx);
        assert!(matches!(
            consumer.deliver(event(2, None)),
            Err(PipelineError::DispatchFailed { .. })
        ));
    }

    #[test]
    fn test_directory_consumer_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut consumer = DirectoryConsumer::new(dir.path().join("events")).unwrap();

        let canonical = EncodedArtifact::canonical(&[0.5; 8], 8_000, 1).unwrap();
        consumer.deliver(event(1, Some(canonical.clone()))).unwrap();
        let passthrough = EncodedArtifact::passthrough(b"OggS....".to_vec(), 48_000, 1);
        consumer.deliver(event(2, Some(passthrough))).unwrap();

        let wav = fs::read(consumer.dir().join("session-000001.wav")).unwrap();
        assert_eq!(wav, canonical.bytes());
        assert!(consumer.dir().join("session-000002.bin").exists());

        let json = fs::read_to_string(consumer.dir().join("session-000001.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["session_id"], 1);
        assert_eq!(value["artifact"]["kind"], "canonical_pcm");
    }

    #[test]
    fn test_shared_collector() {
        let shared = Arc::new(Mutex::new(Vec::new()));
        let mut consumer = Arc::clone(&shared);
        consumer.deliver(event(7, None)).unwrap();
        assert_eq!(shared.lock().unwrap()[0].session_id, 7);
    }
}
