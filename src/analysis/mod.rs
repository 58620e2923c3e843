// Analysis module - live threshold detection on the source stream
//
// This module runs the tick-driven half of the pipeline on a dedicated
// thread, consuming events from the source queue and producing closed
// capture sessions for the processing thread.
//
// Architecture:
// - AnalysisThread: main loop that pops SourceEvents from the rtrb queue
// - Pipeline: SpectralAnalyzer → ThresholdTrigger → CaptureBuffer
// - Output: AudioMetrics / TriggerNotification via tokio broadcast,
//   closed CaptureSessions via tokio mpsc (processed off this thread so
//   encode/decode latency never stalls analysis)

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use crate::audio::buffer_pool::EventReceiver;
use crate::audio::frame::SourceEvent;
use crate::capture::CaptureSession;
use crate::error::PipelineError;
use crate::telemetry;

pub mod detector;
pub mod features;
pub mod spectrum;
pub mod trigger;

pub use detector::{AudioMetrics, DetectorEvent, ThresholdDetector, TriggerNotification};
pub use trigger::TriggerState;

/// Channels and shared flags the analysis thread works against.
pub struct AnalysisChannels {
    pub events: EventReceiver,
    pub metrics_tx: broadcast::Sender<AudioMetrics>,
    pub notification_tx: broadcast::Sender<TriggerNotification>,
    pub session_tx: mpsc::UnboundedSender<CaptureSession>,
    /// Threshold shared with the engine handle; read before every event
    pub threshold_db: Arc<AtomicI32>,
    /// Set by the engine on stop; the loop drains the queue, then exits
    pub shutdown: Arc<AtomicBool>,
    /// Set by the thread once the source reported end of stream
    pub input_finished: Arc<AtomicBool>,
}

struct AnalysisWorker {
    channels: AnalysisChannels,
    detector: ThresholdDetector,
    dropped_reported: u64,
}

impl AnalysisWorker {
    fn new(channels: AnalysisChannels, detector: ThresholdDetector) -> Self {
        Self {
            channels,
            detector,
            dropped_reported: 0,
        }
    }

    fn forward(&self, events: Vec<DetectorEvent>) {
        for event in events {
            match event {
                DetectorEvent::Metrics(metrics) => {
                    // No subscribers is fine
                    let _ = self.channels.metrics_tx.send(metrics);
                }
                DetectorEvent::Notification(notification) => {
                    telemetry::hub().record_notification(
                        notification.session_id,
                        notification.amplitude_db,
                        notification.frequency_hz,
                        notification.timestamp_ms,
                    );
                    let _ = self.channels.notification_tx.send(notification);
                }
                DetectorEvent::SessionClosed(session) => self.hand_off(session),
            }
        }
    }

    fn hand_off(&self, session: CaptureSession) {
        let duration_ms = session
            .closed_at_ms()
            .unwrap_or(session.started_at_ms())
            .saturating_sub(session.started_at_ms());
        telemetry::hub().record_session_closed(session.id(), session.chunks().len(), duration_ms);

        let session_id = session.id();
        if self.channels.session_tx.send(session).is_err() {
            let err = PipelineError::DispatchFailed {
                reason: format!("processing thread gone, session {session_id} lost"),
            };
            crate::error::log_pipeline_error(&err, "AnalysisThread");
            telemetry::hub().record_error(&err, "analysis hand-off");
        }
    }

    fn report_overflow(&mut self) {
        let dropped = self.channels.events.dropped_events();
        if dropped > self.dropped_reported {
            tracing::warn!(
                "[AnalysisThread] Source queue overflowed, {} chunk(s) dropped so far",
                dropped
            );
            self.dropped_reported = dropped;
        }
    }

    fn run(mut self) {
        tracing::info!(
            "[AnalysisThread] Starting analysis loop ({:?}, threshold {} dB)",
            self.detector.format(),
            self.detector.threshold_db()
        );

        loop {
            let event = match self.channels.events.pop() {
                Some(event) => event,
                None => {
                    // Check shutdown only once the queue is drained
                    if self.channels.shutdown.load(Ordering::SeqCst) {
                        tracing::info!(
                            "[AnalysisThread] Shutdown requested and queue empty, exiting"
                        );
                        break;
                    }
                    if self.channels.events.is_finished() {
                        tracing::info!("[AnalysisThread] Source dropped, exiting");
                        self.channels.input_finished.store(true, Ordering::SeqCst);
                        break;
                    }
                    thread::sleep(Duration::from_millis(1));
                    continue;
                }
            };

            telemetry::hub().record_queue_occupancy(
                "source_queue",
                self.channels.events.occupancy_percent(),
            );
            self.report_overflow();

            let threshold = self.channels.threshold_db.load(Ordering::Relaxed);
            if threshold != self.detector.threshold_db() {
                tracing::info!("[AnalysisThread] Threshold changed to {} dB", threshold);
                self.detector.set_threshold(threshold);
            }

            match event {
                SourceEvent::Frame(frame) => {
                    let events = self.detector.process_frame(frame);
                    self.forward(events);
                }
                SourceEvent::Encoded(bytes) => {
                    self.detector.process_encoded(bytes);
                }
                SourceEvent::EndOfStream => {
                    tracing::info!("[AnalysisThread] End of stream");
                    self.channels.input_finished.store(true, Ordering::SeqCst);
                    break;
                }
            }
        }

        if let Some(session) = self.detector.finish() {
            tracing::info!(
                "[AnalysisThread] Closing session {} left open at stop",
                session.id()
            );
            self.hand_off(session);
        }
        tracing::info!("[AnalysisThread] Analysis loop finished");
    }
}

/// Spawn the analysis thread for one recording session.
///
/// The thread exits on end of stream, when the source side is dropped, or
/// once `shutdown` is set and the queue has been drained; any open capture
/// is closed and handed off before it returns.
pub fn spawn_analysis_thread(
    channels: AnalysisChannels,
    detector: ThresholdDetector,
) -> Result<JoinHandle<()>, PipelineError> {
    thread::Builder::new()
        .name("bark-analysis".to_string())
        .spawn(move || AnalysisWorker::new(channels, detector).run())
        .map_err(|err| PipelineError::StreamFailure {
            reason: format!("failed to spawn analysis thread: {err}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer_pool::EventQueue;
    use crate::audio::frame::{AudioFrame, ChunkKind, StreamFormat};
    use crate::config::AppConfig;

    struct Harness {
        metrics_rx: broadcast::Receiver<AudioMetrics>,
        notification_rx: broadcast::Receiver<TriggerNotification>,
        session_rx: mpsc::UnboundedReceiver<CaptureSession>,
        input_finished: Arc<AtomicBool>,
    }

    fn spawn(
        receiver: EventReceiver,
        shutdown: Arc<AtomicBool>,
    ) -> (JoinHandle<()>, Harness) {
        let (metrics_tx, metrics_rx) = broadcast::channel(1024);
        let (notification_tx, notification_rx) = broadcast::channel(16);
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let input_finished = Arc::new(AtomicBool::new(false));
        let config = AppConfig::default();

        let channels = AnalysisChannels {
            events: receiver,
            metrics_tx,
            notification_tx,
            session_tx,
            threshold_db: Arc::new(AtomicI32::new(config.trigger.threshold_db)),
            shutdown,
            input_finished: Arc::clone(&input_finished),
        };
        let detector = ThresholdDetector::new(&config, StreamFormat::mono(8_000), 0).unwrap();
        let handle = spawn_analysis_thread(channels, detector).unwrap();

        (
            handle,
            Harness {
                metrics_rx,
                notification_rx,
                session_rx,
                input_finished,
            },
        )
    }

    fn noise(len: usize) -> Vec<f32> {
        use rand::{rngs::StdRng, Rng, SeedableRng};
        let mut rng = StdRng::seed_from_u64(3);
        (0..len).map(|_| rng.gen_range(-0.5..0.5)).collect()
    }

    #[test]
    fn test_end_of_stream_closes_open_session() {
        let (mut sink, receiver) = EventQueue::new(16);
        let (handle, mut harness) = spawn(receiver, Arc::new(AtomicBool::new(false)));

        assert!(sink.push_blocking(SourceEvent::Frame(AudioFrame::mono(noise(1024), 8_000))));
        assert!(sink.push_blocking(SourceEvent::EndOfStream));
        handle.join().unwrap();

        assert!(harness.input_finished.load(Ordering::SeqCst));
        let session = harness.session_rx.try_recv().unwrap();
        assert_eq!(session.id(), 1);
        assert!(session.is_closed());
        assert!(!session.pcm_samples().is_empty());
        assert!(harness.notification_rx.try_recv().is_ok());
        assert!(harness.metrics_rx.try_recv().is_ok());
    }

    #[test]
    fn test_encoded_chunks_captured_alongside_frames() {
        let (mut sink, receiver) = EventQueue::new(16);
        let (handle, mut harness) = spawn(receiver, Arc::new(AtomicBool::new(false)));

        let samples = noise(3072);
        assert!(sink.push_blocking(SourceEvent::Frame(AudioFrame::mono(
            samples[..2048].to_vec(),
            8_000
        ))));
        assert!(sink.push_blocking(SourceEvent::Encoded(b"OggS".to_vec())));
        assert!(sink.push_blocking(SourceEvent::Frame(AudioFrame::mono(
            samples[2048..].to_vec(),
            8_000
        ))));
        assert!(sink.push_blocking(SourceEvent::Encoded(b"-page".to_vec())));
        assert!(sink.push_blocking(SourceEvent::EndOfStream));
        handle.join().unwrap();

        let session = harness.session_rx.try_recv().unwrap();
        assert_eq!(session.encoded_bytes(), b"OggS-page".to_vec());
        assert!(session.holds(ChunkKind::Pcm));
        assert!(harness.session_rx.try_recv().is_err());
    }

    #[test]
    fn test_shutdown_drains_queue_first() {
        let (mut sink, receiver) = EventQueue::new(16);
        let shutdown = Arc::new(AtomicBool::new(true));
        // Queue fills before the thread starts; shutdown is already set
        for _ in 0..4 {
            assert!(sink.try_push(SourceEvent::Frame(AudioFrame::mono(vec![0.0; 128], 8_000))));
        }
        let (handle, mut harness) = spawn(receiver, shutdown);
        handle.join().unwrap();

        let mut ticks = 0;
        while harness.metrics_rx.try_recv().is_ok() {
            ticks += 1;
        }
        assert_eq!(ticks, 4);
        assert!(!harness.input_finished.load(Ordering::SeqCst));
        assert!(harness.session_rx.try_recv().is_err());
        drop(sink);
    }

    #[test]
    fn test_dropped_source_finishes_loop() {
        let (sink, receiver) = EventQueue::new(4);
        let (handle, harness) = spawn(receiver, Arc::new(AtomicBool::new(false)));
        drop(sink);
        handle.join().unwrap();
        assert!(harness.input_finished.load(Ordering::SeqCst));
    }
}
