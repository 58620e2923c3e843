//! Audio sources feeding the analysis queue.
//!
//! A source owns the underlying device or file handle for the duration of one
//! recording session. `start` hands it the producer half of the event queue;
//! `stop` must release the handle so a new source can be connected.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::buffer_pool::SourceSink;
use crate::audio::frame::{AudioFrame, SourceEvent, StreamFormat};
use crate::codec::decode::{AudioDecoder, PcmDecoder};
use crate::error::PipelineError;

/// Trait implemented by live, file and synthetic audio inputs.
pub trait AudioSource: Send {
    /// Format of the frames this source will deliver.
    fn format(&self) -> StreamFormat;

    /// Begin delivering events into `sink`.
    ///
    /// Fails with [`PipelineError::SourceUnavailable`] when the device cannot
    /// be opened; the caller may retry after re-requesting access.
    fn start(&mut self, sink: SourceSink) -> Result<(), PipelineError>;

    /// Stop delivering and release the underlying handle. Idempotent.
    fn stop(&mut self);
}

/// How fast a non-live source pushes frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Sleep for each chunk's duration (behaves like a live device)
    RealTime,
    /// Push as fast as the queue accepts
    AsFastAsPossible,
}

/// Background pusher shared by the file and synthetic sources.
struct FeederThread {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FeederThread {
    fn spawn(
        name: &str,
        mut sink: SourceSink,
        frames: Vec<AudioFrame>,
        pacing: Pacing,
    ) -> Result<Self, PipelineError> {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop_flag);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for frame in frames {
                    if thread_stop.load(Ordering::Acquire) {
                        break;
                    }
                    let pause = Duration::from_secs_f64(frame.duration_secs());
                    if !sink.push_blocking(SourceEvent::Frame(frame)) {
                        return;
                    }
                    if pacing == Pacing::RealTime {
                        thread::sleep(pause);
                    }
                }
                sink.push_blocking(SourceEvent::EndOfStream);
            })
            .map_err(|err| PipelineError::SourceUnavailable {
                reason: format!("failed to spawn {name}: {err}"),
            })?;

        Ok(Self {
            stop_flag,
            handle: Some(handle),
        })
    }

    fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn split_into_frames(
    samples: &[f32],
    format: StreamFormat,
    chunk_frames: usize,
) -> Vec<AudioFrame> {
    let chunk_len = chunk_frames.max(1) * format.channels.max(1) as usize;
    samples
        .chunks(chunk_len)
        .map(|chunk| AudioFrame::new(chunk.to_vec(), format.sample_rate, format.channels))
        .collect()
}

/// Replays a WAV file as if it were a microphone.
pub struct WavFileSource {
    path: PathBuf,
    samples: Vec<f32>,
    format: StreamFormat,
    chunk_frames: usize,
    pacing: Pacing,
    feeder: Option<FeederThread>,
}

impl WavFileSource {
    /// Decode `path` eagerly so format errors surface before `start`.
    pub fn open(path: impl AsRef<Path>, pacing: Pacing) -> Result<Self, PipelineError> {
        let path = path.as_ref().to_path_buf();
        let bytes = std::fs::read(&path).map_err(|err| PipelineError::SourceUnavailable {
            reason: format!("failed to open {}: {err}", path.display()),
        })?;
        let decoded = PcmDecoder.decode(&bytes)?;

        Ok(Self {
            path,
            samples: decoded.samples,
            format: decoded.format,
            chunk_frames: 1024,
            pacing,
            feeder: None,
        })
    }

    /// Frames per delivered chunk (default 1024).
    pub fn with_chunk_frames(mut self, chunk_frames: usize) -> Self {
        self.chunk_frames = chunk_frames.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AudioSource for WavFileSource {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn start(&mut self, sink: SourceSink) -> Result<(), PipelineError> {
        if self.feeder.is_some() {
            return Err(PipelineError::AlreadyRunning);
        }
        let frames = split_into_frames(&self.samples, self.format, self.chunk_frames);
        self.feeder = Some(FeederThread::spawn(
            "bark-wav-source",
            sink,
            frames,
            self.pacing,
        )?);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut feeder) = self.feeder.take() {
            feeder.stop();
        }
    }
}

impl Drop for WavFileSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One segment of a synthetic programme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyntheticSegment {
    Silence { duration_ms: u32 },
    Sine {
        frequency_hz: f32,
        amplitude: f32,
        duration_ms: u32,
    },
    /// Uniform white noise in [-amplitude, amplitude], seeded for repeatability
    Noise {
        amplitude: f32,
        duration_ms: u32,
        seed: u64,
    },
}

/// Deterministic generated input for demos and tests.
pub struct SyntheticSource {
    format: StreamFormat,
    segments: Vec<SyntheticSegment>,
    chunk_frames: usize,
    pacing: Pacing,
    feeder: Option<FeederThread>,
}

impl SyntheticSource {
    pub fn new(sample_rate: u32, segments: Vec<SyntheticSegment>) -> Self {
        Self {
            format: StreamFormat::mono(sample_rate),
            segments,
            chunk_frames: 256,
            pacing: Pacing::AsFastAsPossible,
            feeder: None,
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_chunk_frames(mut self, chunk_frames: usize) -> Self {
        self.chunk_frames = chunk_frames.max(1);
        self
    }

    fn segment_len(&self, duration_ms: u32) -> usize {
        (self.format.sample_rate as u64 * duration_ms as u64 / 1000) as usize
    }

    /// Render the whole programme into one mono buffer.
    pub fn render(&self) -> Vec<f32> {
        let rate = self.format.sample_rate as f32;
        let mut samples = Vec::new();
        for segment in &self.segments {
            match *segment {
                SyntheticSegment::Silence { duration_ms } => {
                    let count = self.segment_len(duration_ms);
                    samples.extend(std::iter::repeat(0.0).take(count));
                }
                SyntheticSegment::Sine {
                    frequency_hz,
                    amplitude,
                    duration_ms,
                } => {
                    let count = self.segment_len(duration_ms);
                    samples.extend((0..count).map(|i| {
                        let t = i as f32 / rate;
                        amplitude * (2.0 * PI * frequency_hz * t).sin()
                    }));
                }
                SyntheticSegment::Noise {
                    amplitude,
                    duration_ms,
                    seed,
                } => {
                    let count = self.segment_len(duration_ms);
                    let mut rng = StdRng::seed_from_u64(seed);
                    let amplitude = amplitude.abs();
                    samples.extend((0..count).map(|_| {
                        if amplitude > 0.0 {
                            rng.gen_range(-amplitude..=amplitude)
                        } else {
                            0.0
                        }
                    }));
                }
            }
        }
        samples
    }
}

impl AudioSource for SyntheticSource {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn start(&mut self, sink: SourceSink) -> Result<(), PipelineError> {
        if self.feeder.is_some() {
            return Err(PipelineError::AlreadyRunning);
        }
        if self.format.sample_rate == 0 {
            return Err(PipelineError::SourceUnavailable {
                reason: "synthetic source sample rate must be > 0".to_string(),
            });
        }
        let frames = split_into_frames(&self.render(), self.format, self.chunk_frames);
        self.feeder = Some(FeederThread::spawn(
            "bark-synthetic-source",
            sink,
            frames,
            self.pacing,
        )?);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut feeder) = self.feeder.take() {
            feeder.stop();
        }
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.stop();
    }
}
