//! End-to-end tests for the capture pipeline
//!
//! These tests drive the public API the way an embedding application does:
//! - Resampler → feature extractor on synthetic tones
//! - Canonical WAV byte layout
//! - Silence handling across encode and feature extraction
//! - File replay through the engine into a directory consumer

use std::f32::consts::PI;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bark_capture::analysis::features::{normalize, FeatureExtractor};
use bark_capture::audio::{Pacing, SyntheticSegment, SyntheticSource, WavFileSource};
use bark_capture::codec::encode_wav;
use bark_capture::config::{AppConfig, FeatureMode};
use bark_capture::dispatch::{DirectoryConsumer, EventConsumer, ThresholdEvent};
use bark_capture::engine::EngineHandle;
use bark_capture::processing::resample_linear;

fn sine(sample_rate: u32, frequency: f32, amplitude: f32, seconds: f32) -> Vec<f32> {
    let len = (sample_rate as f32 * seconds) as usize;
    (0..len)
        .map(|i| amplitude * (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
        .collect()
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

#[test]
fn test_sine_440_resampled_centroid() {
    let tone = sine(8_000, 440.0, 0.6, 1.0);
    let resampled = resample_linear(&tone, 8_000, 16_000).unwrap();
    assert_eq!(resampled.len(), 16_000);

    let feature_set = FeatureExtractor::new(16_000, FeatureMode::Fft).build_feature_set(
        &resampled,
        8_000,
        true,
    );
    println!("440 Hz features: {:?}", feature_set.features);

    assert_eq!(feature_set.sample_rate, 16_000);
    assert_eq!(feature_set.original_sample_rate, 8_000);
    assert!((feature_set.duration_s - 1.0).abs() < 1e-6);
    assert!(
        (feature_set.features.spectral_centroid - 440.0).abs() < 20.0,
        "centroid {}",
        feature_set.features.spectral_centroid
    );
    // Peak normalized to 0.95: RMS of a sine is peak / sqrt(2)
    assert!((feature_set.features.rms - 0.95 / 2f32.sqrt()).abs() < 0.01);
}

#[test]
fn test_canonical_wav_layout() {
    let samples = sine(16_000, 1_000.0, 0.5, 0.01);
    let bytes = encode_wav(&samples, 16_000, 1).unwrap();

    assert_eq!(bytes.len(), 44 + 2 * samples.len());
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(u32_at(&bytes, 4), 36 + 2 * samples.len() as u32);
    assert_eq!(&bytes[8..12], b"WAVE");
    assert_eq!(&bytes[12..16], b"fmt ");
    assert_eq!(u32_at(&bytes, 16), 16);
    assert_eq!(u16_at(&bytes, 20), 1);
    assert_eq!(u16_at(&bytes, 22), 1);
    assert_eq!(u32_at(&bytes, 24), 16_000);
    assert_eq!(u32_at(&bytes, 28), 32_000);
    assert_eq!(u16_at(&bytes, 32), 2);
    assert_eq!(u16_at(&bytes, 34), 16);
    assert_eq!(&bytes[36..40], b"data");
    assert_eq!(u32_at(&bytes, 40), 2 * samples.len() as u32);
}

#[test]
fn test_empty_wav_is_header_only() {
    let bytes = encode_wav(&[], 16_000, 1).unwrap();
    assert_eq!(bytes.len(), 44);
    assert_eq!(u32_at(&bytes, 40), 0);
}

#[test]
fn test_silence_has_defined_features() {
    let silence = vec![0.0f32; 2_000];
    assert_eq!(normalize(&silence), silence);

    for mode in [FeatureMode::Fft, FeatureMode::Approximate] {
        let features = FeatureExtractor::new(16_000, mode)
            .build_feature_set(&silence, 16_000, true)
            .features;
        assert_eq!(features.rms, 0.0);
        assert_eq!(features.zero_crossing_rate, 0.0);
        assert_eq!(features.spectral_centroid, 0.0);
        assert_eq!(features.spectral_rolloff, 8_000.0);
    }
}

#[test]
fn test_resample_identity_and_round_trip() {
    let tone = sine(11_025, 300.0, 0.4, 0.37);
    let same = resample_linear(&tone, 11_025, 11_025).unwrap();
    assert_eq!(&*same, tone.as_slice());

    let up = resample_linear(&tone, 11_025, 48_000).unwrap();
    let back = resample_linear(&up, 48_000, 11_025).unwrap();
    assert!((back.len() as i64 - tone.len() as i64).abs() <= 1);
}

#[test]
fn test_wav_replay_through_engine() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bursts.wav");
    let program = SyntheticSource::new(
        8_000,
        vec![
            SyntheticSegment::Silence { duration_ms: 200 },
            SyntheticSegment::Noise {
                amplitude: 0.5,
                duration_ms: 300,
                seed: 11,
            },
            SyntheticSegment::Silence { duration_ms: 1_500 },
        ],
    )
    .render();
    std::fs::write(&input, encode_wav(&program, 8_000, 1).unwrap()).unwrap();

    let out_dir = dir.path().join("sessions");
    let engine = EngineHandle::new(AppConfig::default()).unwrap();
    let source = WavFileSource::open(&input, Pacing::AsFastAsPossible).unwrap();
    engine
        .start(
            Box::new(source),
            Box::new(DirectoryConsumer::new(&out_dir).unwrap()),
        )
        .unwrap();
    assert!(engine.wait_for_input_end(Duration::from_secs(10)));
    engine.stop().unwrap();

    let wav = std::fs::read(out_dir.join("session-000001.wav")).unwrap();
    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(u32_at(&wav, 24), 8_000);
    assert!(wav.len() > 44);

    let json = std::fs::read_to_string(out_dir.join("session-000001.json")).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(summary["session_id"], 1);
    assert_eq!(summary["feature_set"]["sample_rate"], 16_000);
    assert!(!out_dir.join("session-000002.json").exists());
}

#[test]
fn test_threshold_change_between_sessions() {
    // Readings never exceed 0 dB, so the first pass cannot trigger
    let program = vec![
        SyntheticSegment::Noise {
            amplitude: 0.5,
            duration_ms: 300,
            seed: 5,
        },
        SyntheticSegment::Silence { duration_ms: 1_000 },
    ];
    let events = Arc::new(Mutex::new(Vec::<ThresholdEvent>::new()));
    let consumer: Box<dyn EventConsumer> = Box::new(Arc::clone(&events));

    let engine = EngineHandle::new(AppConfig::default()).unwrap();
    engine.set_threshold(0);
    engine
        .start(Box::new(SyntheticSource::new(8_000, program.clone())), consumer)
        .unwrap();
    assert!(engine.wait_for_input_end(Duration::from_secs(10)));
    assert!(events.lock().unwrap().is_empty());

    engine.set_threshold(-30);
    engine
        .reconnect(Box::new(SyntheticSource::new(8_000, program)))
        .unwrap();
    assert!(engine.wait_for_input_end(Duration::from_secs(10)));
    engine.stop().unwrap();

    assert_eq!(events.lock().unwrap().len(), 1);
}
