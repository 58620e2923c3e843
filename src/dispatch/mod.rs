// Dispatcher - delivers packaged sessions to the external consumer
//
// Events arrive from the post-processing thread in session-close order and
// are handed over one at a time; nothing is reordered, buffered or dropped.

pub mod consumers;
pub mod event;

pub use consumers::{ChannelConsumer, DirectoryConsumer, EventConsumer};
pub use event::{ArtifactSummary, EventSummary, ThresholdEvent};

use crate::error::{log_pipeline_error, PipelineError};
use crate::telemetry;

pub struct Dispatcher {
    consumer: Box<dyn EventConsumer>,
    last_session_id: Option<u64>,
    delivered: u64,
}

impl Dispatcher {
    pub fn new(consumer: Box<dyn EventConsumer>) -> Self {
        Self {
            consumer,
            last_session_id: None,
            delivered: 0,
        }
    }

    /// Number of events the consumer accepted.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Give the consumer back (used when a session is restarted).
    pub fn into_consumer(self) -> Box<dyn EventConsumer> {
        self.consumer
    }

    /// Deliver one event exactly once.
    ///
    /// A consumer error is logged and returned; the event is not retried.
    pub fn dispatch(&mut self, event: ThresholdEvent) -> Result<(), PipelineError> {
        let session_id = event.session_id;
        if let Some(last) = self.last_session_id {
            if session_id <= last {
                tracing::warn!(
                    "[Dispatcher] Session {} delivered after session {}",
                    session_id,
                    last
                );
            }
        }
        self.last_session_id = Some(session_id);

        match self.consumer.deliver(event) {
            Ok(()) => {
                self.delivered += 1;
                tracing::debug!("[Dispatcher] Delivered session {}", session_id);
                Ok(())
            }
            Err(err) => {
                log_pipeline_error(&err, "dispatch");
                telemetry::hub().record_error(&err, format!("dispatch session {}", session_id));
                Err(err)
            }
        }
    }
}
