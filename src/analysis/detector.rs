// Threshold detector - analyzer + trigger + capture buffer for one stream
//
// Single-writer context for the analysis thread. Incoming frames are cut at
// tick boundaries (every `tick_interval_ms` of stream time). For each piece:
//
// 1. Feed the piece (mono) to the spectral analyzer
// 2. If a tick is due, take a reading and run the trigger
// 3. If a capture is open after step 2, append the piece to it
//
// so the piece that crosses the threshold is part of the capture, and the
// piece that drops back below it is not. Time is stream time (frames
// processed / sample rate) offset by the wall-clock start, which keeps the
// cooldown deterministic for file replay.

use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use crate::analysis::spectrum::{AmplitudeReading, SpectralAnalyzer};
use crate::analysis::trigger::{ThresholdTrigger, TriggerState, TriggerTransition};
use crate::audio::frame::{AudioChunk, AudioFrame, StreamFormat};
use crate::capture::{CaptureBuffer, CaptureSession};
use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::processing::downmix_to_mono;

/// Live display values published every tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioMetrics {
    pub timestamp_ms: u64,
    pub amplitude_db: f32,
    /// Running maximum since start (display only)
    pub peak_db: f32,
    pub frequency_hz: f32,
    pub state: TriggerState,
}

/// Cooldown-throttled "trigger fired" signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerNotification {
    pub session_id: u64,
    pub timestamp_ms: u64,
    pub amplitude_db: f32,
    pub frequency_hz: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectorEvent {
    Metrics(AudioMetrics),
    Notification(TriggerNotification),
    SessionClosed(CaptureSession),
}

pub struct ThresholdDetector {
    analyzer: SpectralAnalyzer,
    trigger: ThresholdTrigger,
    capture: CaptureBuffer,
    format: StreamFormat,
    tick_frames: usize,
    frames_since_tick: usize,
    processed_frames: u64,
    start_unix_ms: u64,
}

impl ThresholdDetector {
    /// # Arguments
    /// * `config` - Trigger and analysis settings (validated here)
    /// * `format` - Format every frame of this stream must have
    /// * `start_unix_ms` - Wall-clock anchor for event timestamps
    pub fn new(
        config: &AppConfig,
        format: StreamFormat,
        start_unix_ms: u64,
    ) -> Result<Self, PipelineError> {
        let analyzer = SpectralAnalyzer::new(&config.analysis, format.sample_rate)?;
        let tick_frames =
            ((format.sample_rate as u64 * config.analysis.tick_interval_ms) / 1000).max(1) as usize;

        Ok(Self {
            analyzer,
            trigger: ThresholdTrigger::new(
                config.trigger.threshold_db,
                Duration::from_millis(config.trigger.cooldown_ms),
            ),
            capture: CaptureBuffer::new(),
            format: StreamFormat::new(format.sample_rate, format.channels.max(1)),
            tick_frames,
            frames_since_tick: 0,
            processed_frames: 0,
            start_unix_ms,
        })
    }

    /// Draw session ids from a counter shared with other detectors, so a
    /// restarted stream keeps numbering where the previous one stopped.
    pub fn with_session_ids(mut self, next_id: Arc<AtomicU64>) -> Self {
        self.capture = CaptureBuffer::with_session_ids(next_id);
        self
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn state(&self) -> TriggerState {
        self.trigger.state()
    }

    pub fn threshold_db(&self) -> i32 {
        self.trigger.threshold_db()
    }

    /// Takes effect at the next tick.
    pub fn set_threshold(&mut self, threshold_db: i32) {
        self.trigger.set_threshold(threshold_db);
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_open()
    }

    pub fn peak_db(&self) -> f32 {
        self.analyzer.peak_db()
    }

    /// Stream time elapsed since start
    pub fn elapsed(&self) -> Duration {
        let nanos = self.processed_frames as u128 * 1_000_000_000 / self.format.sample_rate as u128;
        Duration::from_nanos(nanos as u64)
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.start_unix_ms + self.elapsed().as_millis() as u64
    }

    /// Analyse and (if a capture is open) record one frame.
    pub fn process_frame(&mut self, frame: AudioFrame) -> Vec<DetectorEvent> {
        let mut events = Vec::new();
        if frame.format() != self.format {
            tracing::warn!(
                "[AnalysisThread] Dropping frame with format {:?}, stream is {:?}",
                frame.format(),
                self.format
            );
            return events;
        }

        let channels = self.format.channels as usize;
        let samples = frame.samples();
        let total_frames = frame.frame_count();
        let mut offset = 0;

        while offset < total_frames {
            let piece_frames =
                (self.tick_frames - self.frames_since_tick).min(total_frames - offset);
            let piece = &samples[offset * channels..(offset + piece_frames) * channels];
            offset += piece_frames;

            self.analyzer
                .push_samples(&downmix_to_mono(piece, self.format.channels));
            self.frames_since_tick += piece_frames;
            self.processed_frames += piece_frames as u64;

            if self.frames_since_tick >= self.tick_frames {
                self.frames_since_tick = 0;
                let reading = self.analyzer.tick();
                self.apply_reading(reading, &mut events);
            }

            if self.capture.is_open() {
                self.capture.append(AudioChunk::Pcm(AudioFrame::new(
                    piece.to_vec(),
                    self.format.sample_rate,
                    self.format.channels,
                )));
            }
        }

        events
    }

    /// Record source-encoded bytes into the open capture (never analysed).
    ///
    /// Returns false when no capture is open.
    pub fn process_encoded(&mut self, bytes: Vec<u8>) -> bool {
        self.capture.append(AudioChunk::Encoded(bytes))
    }

    /// Run the trigger on an externally produced reading at the current
    /// stream time.
    pub fn process_reading(&mut self, reading: AmplitudeReading) -> Vec<DetectorEvent> {
        let mut events = Vec::new();
        self.apply_reading(reading, &mut events);
        events
    }

    fn apply_reading(&mut self, reading: AmplitudeReading, events: &mut Vec<DetectorEvent>) {
        let timestamp_ms = self.timestamp_ms();

        match self.trigger.process(reading.amplitude_db, self.elapsed()) {
            Some(TriggerTransition::Opened { notify }) => {
                let (session_id, dangling) = self.capture.open(timestamp_ms, reading, self.format);
                if let Some(session) = dangling {
                    events.push(DetectorEvent::SessionClosed(session));
                }
                tracing::debug!(
                    "[AnalysisThread] Threshold exceeded ({:.1} dB > {} dB), session {} opened",
                    reading.amplitude_db,
                    self.trigger.threshold_db(),
                    session_id
                );
                if notify {
                    events.push(DetectorEvent::Notification(TriggerNotification {
                        session_id,
                        timestamp_ms,
                        amplitude_db: reading.amplitude_db,
                        frequency_hz: reading.frequency_hz,
                    }));
                }
            }
            Some(TriggerTransition::Closed) => {
                if let Some(session) = self.capture.close(timestamp_ms) {
                    tracing::debug!(
                        "[AnalysisThread] Session {} closed with {} chunk(s)",
                        session.id(),
                        session.chunks().len()
                    );
                    events.push(DetectorEvent::SessionClosed(session));
                }
            }
            None => {}
        }

        events.push(DetectorEvent::Metrics(AudioMetrics {
            timestamp_ms,
            amplitude_db: reading.amplitude_db,
            peak_db: self.analyzer.peak_db().max(reading.amplitude_db),
            frequency_hz: reading.frequency_hz,
            state: self.trigger.state(),
        }));
    }

    /// Stop: close any open capture and forget trigger/analyzer state.
    pub fn finish(&mut self) -> Option<CaptureSession> {
        let closed = self.capture.close(self.timestamp_ms());
        self.trigger.reset();
        self.analyzer.reset();
        self.frames_since_tick = 0;
        closed
    }
}
