use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bark_capture::analysis::features::FeatureExtractor;
use bark_capture::audio::{AudioSource, Pacing, WavFileSource};
use bark_capture::codec::{AudioDecoder, EncodedArtifact, PcmDecoder};
use bark_capture::config::{AppConfig, FeatureMode};
use bark_capture::dispatch::DirectoryConsumer;
use bark_capture::engine::EngineHandle;
use bark_capture::processing::{downmix_to_mono, resample_linear};
use bark_capture::telemetry::{self, MetricEvent};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "bark_capture",
    about = "Threshold-triggered audio capture and feature extraction"
)]
struct Cli {
    /// JSON configuration file (defaults are used when absent or invalid)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the trigger threshold in dB
    #[arg(long, global = true, allow_hyphen_values = true)]
    threshold: Option<i32>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture from the default input device
    Listen {
        #[arg(long)]
        out_dir: PathBuf,
        /// Stop after this many seconds
        #[arg(long, default_value_t = 30)]
        seconds: u64,
    },
    /// Replay a WAV file through the capture pipeline
    Replay {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out_dir: PathBuf,
        /// Pace the file like a live device instead of as fast as possible
        #[arg(long)]
        realtime: bool,
        /// Give up waiting for the end of the file after this many seconds
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,
    },
    /// Re-encode a WAV file as canonical 16-bit PCM
    Encode {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Print the classifier feature set of a WAV file as JSON
    Features {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Fft,
    Approximate,
}

impl From<ModeArg> for FeatureMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Fft => FeatureMode::Fft,
            ModeArg::Approximate => FeatureMode::Approximate,
        }
    }
}

#[derive(Serialize)]
struct EncodeReport<'a> {
    output: &'a Path,
    sample_rate: u32,
    channels: u16,
    byte_len: usize,
}

#[derive(Serialize)]
struct FeatureReport {
    sample_rate: u32,
    original_sample_rate: u32,
    duration_s: f32,
    is_mono: bool,
    features: bark_capture::Features,
}

fn main() -> ExitCode {
    telemetry::init_logging("info");
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = cli
        .config
        .as_ref()
        .map(AppConfig::load_from_file)
        .unwrap_or_default();
    if let Some(threshold) = cli.threshold {
        config.trigger.threshold_db = threshold;
    }

    match cli.command {
        Commands::Listen { out_dir, seconds } => run_listen(config, &out_dir, seconds),
        Commands::Replay {
            input,
            out_dir,
            realtime,
            timeout_secs,
        } => run_replay(config, &input, &out_dir, realtime, timeout_secs),
        Commands::Encode { input, output } => run_encode(&input, &output),
        Commands::Features { input, mode } => {
            let mode = mode.map(FeatureMode::from).unwrap_or(config.capture.feature_mode);
            run_features(&config, &input, mode)
        }
    }
}

#[cfg(feature = "live-input")]
fn run_listen(config: AppConfig, out_dir: &Path, seconds: u64) -> Result<ExitCode> {
    let source = bark_capture::audio::CpalSource::open_default()
        .context("opening default input device")?;
    let mut engine = Recording::new(config, out_dir)?;
    engine.start(Box::new(source))?;
    println!("Listening for {seconds} s, writing sessions to {}", out_dir.display());
    std::thread::sleep(Duration::from_secs(seconds));
    engine.finish()
}

#[cfg(not(feature = "live-input"))]
fn run_listen(_config: AppConfig, _out_dir: &Path, _seconds: u64) -> Result<ExitCode> {
    bail!("built without the live-input feature")
}

fn run_replay(
    config: AppConfig,
    input: &Path,
    out_dir: &Path,
    realtime: bool,
    timeout_secs: u64,
) -> Result<ExitCode> {
    let pacing = if realtime {
        Pacing::RealTime
    } else {
        Pacing::AsFastAsPossible
    };
    let source = WavFileSource::open(input, pacing)
        .with_context(|| format!("opening {}", input.display()))?;
    let mut engine = Recording::new(config, out_dir)?;
    engine.start(Box::new(source))?;

    if !engine
        .handle
        .wait_for_input_end(Duration::from_secs(timeout_secs))
    {
        eprintln!("Replay did not finish within {timeout_secs} s, stopping");
    }
    engine.finish()
}

/// Engine writing every event into `out_dir`, plus a notification printer.
struct Recording {
    handle: EngineHandle,
    out_dir: PathBuf,
    notifications: tokio::sync::broadcast::Receiver<bark_capture::TriggerNotification>,
}

impl Recording {
    fn new(config: AppConfig, out_dir: &Path) -> Result<Self> {
        let handle = EngineHandle::new(config).context("invalid configuration")?;
        let notifications = handle.subscribe_notifications();
        Ok(Self {
            handle,
            out_dir: out_dir.to_path_buf(),
            notifications,
        })
    }

    fn start(&mut self, source: Box<dyn AudioSource>) -> Result<()> {
        let consumer = DirectoryConsumer::new(&self.out_dir)
            .with_context(|| format!("preparing {}", self.out_dir.display()))?;
        self.handle
            .start(source, Box::new(consumer))
            .context("starting capture")
    }

    fn finish(mut self) -> Result<ExitCode> {
        self.handle.stop().context("stopping capture")?;

        while let Ok(notification) = self.notifications.try_recv() {
            println!("{}", serde_json::to_string(&notification)?);
        }
        let snapshot = telemetry::hub().snapshot();
        let latest = snapshot.recent.iter().rev().find_map(|event| match event {
            MetricEvent::Dispatched {
                avg_processing_ms,
                max_processing_ms,
                ..
            } => Some((*avg_processing_ms, *max_processing_ms)),
            _ => None,
        });
        match latest {
            Some((avg, max)) => eprintln!(
                "{} telemetry event(s), processing avg {:.2} ms, max {:.2} ms",
                snapshot.total_events, avg, max
            ),
            None => eprintln!("{} telemetry event(s), nothing dispatched", snapshot.total_events),
        }
        Ok(ExitCode::from(0))
    }
}

fn run_encode(input: &Path, output: &Path) -> Result<ExitCode> {
    let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let decoded = PcmDecoder
        .decode(&bytes)
        .with_context(|| format!("decoding {}", input.display()))?;

    let (samples, channels) = if decoded.format.channels > 2 {
        (
            downmix_to_mono(&decoded.samples, decoded.format.channels).into_owned(),
            1,
        )
    } else {
        (decoded.samples, decoded.format.channels)
    };
    let artifact = EncodedArtifact::canonical(&samples, decoded.format.sample_rate, channels)?;
    fs::write(output, artifact.bytes())
        .with_context(|| format!("writing {}", output.display()))?;

    let report = EncodeReport {
        output,
        sample_rate: artifact.sample_rate(),
        channels: artifact.channels(),
        byte_len: artifact.bytes().len(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}

fn run_features(config: &AppConfig, input: &Path, mode: FeatureMode) -> Result<ExitCode> {
    let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let decoded = PcmDecoder
        .decode(&bytes)
        .with_context(|| format!("decoding {}", input.display()))?;
    let format = decoded.format;
    if format.sample_rate == 0 {
        bail!("{} declares a zero sample rate", input.display());
    }

    let target = config.capture.target_sample_rate;
    let mono = downmix_to_mono(&decoded.samples, format.channels);
    let resampled = resample_linear(&mono, format.sample_rate, target)?;
    let feature_set = FeatureExtractor::new(target, mode).build_feature_set(
        &resampled,
        format.sample_rate,
        format.channels <= 1,
    );

    let report = FeatureReport {
        sample_rate: feature_set.sample_rate,
        original_sample_rate: feature_set.original_sample_rate,
        duration_s: feature_set.duration_s,
        is_mono: feature_set.is_mono,
        features: feature_set.features,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}
