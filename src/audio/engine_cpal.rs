// Live microphone source backed by cpal
//
// cpal::Stream is not Send on every platform, so the stream is built, played
// and dropped on a dedicated thread. The engine only holds channels to that
// thread: one reporting the startup result, one carrying the stop signal.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use crate::audio::buffer_pool::SourceSink;
use crate::audio::frame::{AudioFrame, SourceEvent, StreamFormat};
use crate::audio::source::AudioSource;
use crate::error::PipelineError;

/// Default input device of the default cpal host.
pub struct CpalSource {
    format: StreamFormat,
    stop_tx: Option<mpsc::Sender<()>>,
    stream_thread: Option<JoinHandle<()>>,
}

impl CpalSource {
    /// Query the default input device so the stream format is known before
    /// `start`. Fails when no device is present.
    pub fn open_default() -> Result<Self, PipelineError> {
        let (_, config) = default_input()?;
        Ok(Self {
            format: StreamFormat::new(config.sample_rate().0, config.channels()),
            stop_tx: None,
            stream_thread: None,
        })
    }
}

fn default_input() -> Result<(cpal::Device, cpal::SupportedStreamConfig), PipelineError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| PipelineError::SourceUnavailable {
            reason: "No default input device found".to_string(),
        })?;

    let config = device
        .default_input_config()
        .map_err(|e| PipelineError::SourceUnavailable {
            reason: format!("Failed to get default input config: {:?}", e),
        })?;

    Ok((device, config))
}

fn build_input_stream(mut sink: SourceSink) -> Result<cpal::Stream, PipelineError> {
    let (device, config) = default_input()?;
    let stream_config: cpal::StreamConfig = config.clone().into();
    let sample_rate = stream_config.sample_rate.0;
    let channels = stream_config.channels;

    let err_fn = |err| tracing::error!("[CpalSource] Input stream error: {}", err);

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Real-time callback: never block, overflow is counted by the sink
                let frame = AudioFrame::new(data.to_vec(), sample_rate, channels);
                sink.try_push(SourceEvent::Frame(frame));
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let samples = data.iter().map(|&s| s as f32 / 32768.0).collect();
                sink.try_push(SourceEvent::Frame(AudioFrame::new(
                    samples,
                    sample_rate,
                    channels,
                )));
            },
            err_fn,
            None,
        ),
        other => {
            return Err(PipelineError::SourceUnavailable {
                reason: format!("Unsupported input sample format: {:?}", other),
            })
        }
    }
    .map_err(|e| PipelineError::SourceUnavailable {
        reason: format!("{:?}", e),
    })?;

    stream.play().map_err(|e| PipelineError::SourceUnavailable {
        reason: format!("Failed to start input stream: {:?}", e),
    })?;

    Ok(stream)
}

impl AudioSource for CpalSource {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn start(&mut self, sink: SourceSink) -> Result<(), PipelineError> {
        if self.stream_thread.is_some() {
            return Err(PipelineError::AlreadyRunning);
        }

        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("bark-cpal-input".to_string())
            .spawn(move || {
                let stream = match build_input_stream(sink) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                // Blocks until stop() sends or drops the sender
                let _ = stop_rx.recv();
                drop(stream);
                tracing::info!("[CpalSource] Input stream released");
            })
            .map_err(|e| PipelineError::SourceUnavailable {
                reason: format!("failed to spawn input thread: {e}"),
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                tracing::info!(
                    "[CpalSource] Input stream started: {} Hz, {} channel(s)",
                    self.format.sample_rate,
                    self.format.channels
                );
                self.stop_tx = Some(stop_tx);
                self.stream_thread = Some(handle);
                Ok(())
            }
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(err)
            }
            Err(_) => {
                let _ = handle.join();
                Err(PipelineError::SourceUnavailable {
                    reason: "input thread exited before reporting".to_string(),
                })
            }
        }
    }

    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.stream_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        self.stop();
    }
}
