//! Telemetry event types describing pipeline activity for the CLI and
//! any diagnostics subscriber.

use serde::{Deserialize, Serialize};

/// Metric events covering triggers, session hand-off, decoding and delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    /// Externally visible trigger notification (cooldown already applied)
    Notification {
        session_id: u64,
        amplitude_db: f32,
        frequency_hz: f32,
        timestamp_ms: u64,
    },
    SessionClosed {
        session_id: u64,
        chunk_count: usize,
        duration_ms: u64,
    },
    /// Encoded audio could not be decoded; raw bytes were emitted instead
    DecodeFallback {
        session_id: u64,
        format: String,
        reason: String,
    },
    Dispatched {
        session_id: u64,
        processing_ms: f32,
        avg_processing_ms: f32,
        max_processing_ms: f32,
    },
    QueueOccupancy {
        channel: String,
        percent: f32,
    },
    Error {
        code: i32,
        context: String,
    },
}
