//! EngineHandle: owner of one live recording session at a time.
//!
//! A recording session wires a source to the analysis thread through the
//! bounded event queue, and the analysis thread to the processing thread
//! through an unbounded hand-off channel:
//!
//! ```text
//! AudioSource ──rtrb──▶ AnalysisThread ──mpsc──▶ ProcessingThread ──▶ EventConsumer
//!                            │
//!                            └──broadcast──▶ AudioMetrics / TriggerNotification
//! ```
//!
//! Broadcast senders live on the handle, so subscriptions survive `stop` and
//! `start`. So does the session id counter: a consumer reused by `reconnect`
//! never sees an id twice. The threshold is shared with the analysis thread
//! through an atomic and takes effect at the next event.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};

use crate::analysis::{
    spawn_analysis_thread, AnalysisChannels, AudioMetrics, ThresholdDetector, TriggerNotification,
};
use crate::audio::buffer_pool::EventQueue;
use crate::audio::source::AudioSource;
use crate::capture::CaptureSession;
use crate::config::AppConfig;
use crate::dispatch::{Dispatcher, EventConsumer};
use crate::engine::clock::{SystemTimeSource, TimeSource};
use crate::error::PipelineError;
use crate::processing::SessionProcessor;
use crate::telemetry;

#[path = "core_subscriptions.rs"]
mod core_subscriptions;

const METRICS_CHANNEL_CAPACITY: usize = 256;
const NOTIFICATION_CHANNEL_CAPACITY: usize = 32;

/// Threads and handles of the active recording session.
struct RunningSession {
    source: Box<dyn AudioSource>,
    shutdown: Arc<AtomicBool>,
    analysis: JoinHandle<()>,
    processing: JoinHandle<()>,
    dispatcher: DispatcherSlot,
}

/// Holds the dispatcher whenever the processing thread is not running.
type DispatcherSlot = Arc<Mutex<Option<Dispatcher>>>;

/// EngineHandle orchestrates source, analysis and processing threads.
pub struct EngineHandle {
    config: AppConfig,
    threshold_db: Arc<AtomicI32>,
    time_source: Arc<dyn TimeSource>,
    metrics_tx: broadcast::Sender<AudioMetrics>,
    notification_tx: broadcast::Sender<TriggerNotification>,
    input_finished: Arc<AtomicBool>,
    session_ids: Arc<AtomicU64>,
    running: Mutex<Option<RunningSession>>,
    idle_consumer: Mutex<Option<Box<dyn EventConsumer>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl EngineHandle {
    /// Create a handle for `config`.
    ///
    /// # Returns
    /// `ConfigurationInvalid` when any section fails validation; nothing is
    /// started until [`EngineHandle::start`].
    pub fn new(config: AppConfig) -> Result<Self, PipelineError> {
        Self::with_time_source(config, Arc::new(SystemTimeSource::default()))
    }

    pub fn with_time_source(
        config: AppConfig,
        time_source: Arc<dyn TimeSource>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        let (metrics_tx, _) = broadcast::channel(METRICS_CHANNEL_CAPACITY);
        let (notification_tx, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);

        Ok(Self {
            threshold_db: Arc::new(AtomicI32::new(config.trigger.threshold_db)),
            config,
            time_source,
            metrics_tx,
            notification_tx,
            input_finished: Arc::new(AtomicBool::new(false)),
            session_ids: Arc::new(AtomicU64::new(1)),
            running: Mutex::new(None),
            idle_consumer: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        lock(&self.running).is_some()
    }

    /// True once the current source reported end of stream (or went away).
    pub fn is_input_finished(&self) -> bool {
        self.input_finished.load(Ordering::SeqCst)
    }

    /// Poll until the source finishes or `timeout` elapses.
    ///
    /// # Returns
    /// true if the source finished within the timeout
    pub fn wait_for_input_end(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.is_input_finished() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        self.is_input_finished()
    }

    pub fn threshold_db(&self) -> i32 {
        self.threshold_db.load(Ordering::Relaxed)
    }

    /// Change the trigger threshold; applies from the next analysis tick.
    pub fn set_threshold(&self, threshold_db: i32) {
        self.threshold_db.store(threshold_db, Ordering::Relaxed);
    }

    /// Start a recording session from `source`, delivering to `consumer`.
    ///
    /// Fails with `AlreadyRunning` while a session is active, and with the
    /// source's own error (typically `SourceUnavailable`) if it cannot
    /// start. On any failure nothing is left running and `consumer` is kept
    /// for a later [`EngineHandle::reconnect`].
    pub fn start(
        &self,
        mut source: Box<dyn AudioSource>,
        consumer: Box<dyn EventConsumer>,
    ) -> Result<(), PipelineError> {
        let mut running = lock(&self.running);
        if running.is_some() {
            return Err(PipelineError::AlreadyRunning);
        }

        let format = source.format();
        let detector =
            match ThresholdDetector::new(&self.config, format, self.time_source.now_unix_ms()) {
                Ok(detector) => detector.with_session_ids(Arc::clone(&self.session_ids)),
                Err(err) => {
                    tracing::warn!("[EngineHandle] Cannot analyse source: {}", err);
                    self.park_consumer(consumer);
                    return Err(err);
                }
            };
        let (sink, receiver) = EventQueue::new(self.config.capture.queue_capacity);
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        self.input_finished.store(false, Ordering::SeqCst);

        let dispatcher: DispatcherSlot = Arc::new(Mutex::new(Some(Dispatcher::new(consumer))));
        let processing = match spawn_processing_thread(
            session_rx,
            SessionProcessor::new(&self.config.capture),
            Arc::clone(&dispatcher),
        ) {
            Ok(handle) => handle,
            Err(err) => {
                self.recover_consumer(&dispatcher);
                return Err(err);
            }
        };

        let channels = AnalysisChannels {
            events: receiver,
            metrics_tx: self.metrics_tx.clone(),
            notification_tx: self.notification_tx.clone(),
            session_tx,
            threshold_db: Arc::clone(&self.threshold_db),
            shutdown: Arc::clone(&shutdown),
            input_finished: Arc::clone(&self.input_finished),
        };
        // Analysis thread owns the only session sender; when it exits the
        // processing thread drains and returns.
        let analysis = match spawn_analysis_thread(channels, detector) {
            Ok(handle) => handle,
            Err(err) => {
                let _ = processing.join();
                self.recover_consumer(&dispatcher);
                return Err(err);
            }
        };

        if let Err(err) = source.start(sink) {
            tracing::warn!("[EngineHandle] Source failed to start: {}", err);
            shutdown.store(true, Ordering::SeqCst);
            let _ = analysis.join();
            let _ = processing.join();
            self.recover_consumer(&dispatcher);
            telemetry::hub().record_error(&err, "source start");
            return Err(err);
        }

        tracing::info!(
            "[EngineHandle] Recording started ({} Hz, {} ch, threshold {} dB)",
            format.sample_rate,
            format.channels,
            self.threshold_db()
        );
        *running = Some(RunningSession {
            source,
            shutdown,
            analysis,
            processing,
            dispatcher,
        });
        Ok(())
    }

    /// Stop the active session.
    ///
    /// Queued chunks are analysed, an open capture is closed and dispatched,
    /// and all threads are joined before this returns. The next `start`
    /// begins with a fresh trigger (no cooldown carried over).
    pub fn stop(&self) -> Result<(), PipelineError> {
        let session = lock(&self.running)
            .take()
            .ok_or(PipelineError::NotRunning)?;
        let RunningSession {
            mut source,
            shutdown,
            analysis,
            processing,
            dispatcher,
        } = session;

        // Release the device first so nothing new is queued
        source.stop();
        shutdown.store(true, Ordering::SeqCst);

        if analysis.join().is_err() {
            tracing::error!("[EngineHandle] Analysis thread panicked");
        }
        if processing.join().is_err() {
            let err = PipelineError::StreamFailure {
                reason: "processing thread panicked".to_string(),
            };
            telemetry::hub().record_error(&err, "stop");
            return Err(err);
        }
        if let Some(delivered) = self.recover_consumer(&dispatcher) {
            tracing::info!(
                "[EngineHandle] Recording stopped, {} event(s) delivered",
                delivered
            );
        }
        Ok(())
    }

    /// Release the current source (if any) and start `source` with the
    /// consumer of the previous session.
    ///
    /// Fails with `NotRunning` when no session has been started before.
    pub fn reconnect(&self, source: Box<dyn AudioSource>) -> Result<(), PipelineError> {
        match self.stop() {
            Ok(()) | Err(PipelineError::NotRunning) => {}
            Err(err) => return Err(err),
        }
        let consumer = lock(&self.idle_consumer)
            .take()
            .ok_or(PipelineError::NotRunning)?;
        self.start(source, consumer)
    }

    fn park_consumer(&self, consumer: Box<dyn EventConsumer>) {
        *lock(&self.idle_consumer) = Some(consumer);
    }

    /// Keep the consumer of a finished (or never started) processing thread
    /// for the next `start`.
    ///
    /// # Returns
    /// Number of events it accepted, if the dispatcher was still there
    fn recover_consumer(&self, slot: &DispatcherSlot) -> Option<u64> {
        let dispatcher = lock(slot).take()?;
        let delivered = dispatcher.delivered();
        self.park_consumer(dispatcher.into_consumer());
        Some(delivered)
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.stop();
        }
    }
}

/// Spawn the post-processing thread: closed session → event → consumer.
///
/// The thread borrows the dispatcher from `slot` and puts it back when the
/// session channel closes, so the consumer can be reused. If the spawn
/// fails the dispatcher never leaves `slot`.
fn spawn_processing_thread(
    mut session_rx: mpsc::UnboundedReceiver<CaptureSession>,
    processor: SessionProcessor,
    slot: DispatcherSlot,
) -> Result<JoinHandle<()>, PipelineError> {
    thread::Builder::new()
        .name("bark-processing".to_string())
        .spawn(move || {
            let Some(mut dispatcher) = lock(&slot).take() else {
                tracing::error!("[SessionProcessor] No dispatcher, sessions will not be delivered");
                return;
            };
            while let Some(session) = session_rx.blocking_recv() {
                let session_id = session.id();
                let started = Instant::now();
                let event = processor.process(session);

                if dispatcher.dispatch(event).is_ok() {
                    let elapsed_ms = started.elapsed().as_secs_f32() * 1000.0;
                    telemetry::hub().record_dispatch(session_id, elapsed_ms);
                    tracing::debug!(
                        "[SessionProcessor] Session {} processed in {:.2} ms",
                        session_id,
                        elapsed_ms
                    );
                }
            }
            *lock(&slot) = Some(dispatcher);
        })
        .map_err(|err| PipelineError::StreamFailure {
            reason: format!("failed to spawn processing thread: {err}"),
        })
}
