use tokio::sync::broadcast;

use super::EngineHandle;
use crate::analysis::{AudioMetrics, TriggerNotification};
use crate::telemetry::{self, MetricEvent};

impl EngineHandle {
    // ========================================================================
    // STREAM SUBSCRIPTIONS
    // ========================================================================

    /// Per-tick amplitude / peak / dominant frequency / trigger state.
    ///
    /// Slow receivers lag (and skip) rather than block the analysis thread.
    pub fn subscribe_metrics(&self) -> broadcast::Receiver<AudioMetrics> {
        self.metrics_tx.subscribe()
    }

    /// Cooldown-throttled trigger notifications.
    pub fn subscribe_notifications(&self) -> broadcast::Receiver<TriggerNotification> {
        self.notification_tx.subscribe()
    }

    /// Process-wide pipeline telemetry.
    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<MetricEvent> {
        telemetry::hub().subscribe()
    }
}
