// Canonical WAV encoder - 44-byte RIFF header + 16-bit little-endian PCM
//
// Layout (byte offset: field):
//   0 "RIFF" | 4 total size - 8 | 8 "WAVE" | 12 "fmt " | 16 16 | 20 1 (PCM)
//   22 channels | 24 sample rate | 28 byte rate | 32 block align | 34 16
//   36 "data" | 40 data length
//
// hound emits exactly this layout for integer PCM at <= 16 bits and <= 2
// channels, so wider layouts are rejected here rather than silently written
// as WAVE_FORMAT_EXTENSIBLE.

use std::io::Cursor;

use crate::error::PipelineError;

pub const WAV_HEADER_LEN: usize = 44;
pub const BITS_PER_SAMPLE: u16 = 16;
pub const MAX_CHANNELS: u16 = 2;

/// Convert a linear sample to signed 16-bit PCM.
///
/// Clamps to [-1.0, 1.0]; negatives scale by 32768, non-negatives by 32767,
/// then round. NaN maps to silence.
pub fn pcm16_from_f32(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0).round() as i16
    } else {
        (s * 32767.0).round() as i16
    }
}

/// Encode interleaved samples as a canonical WAV byte buffer.
///
/// # Arguments
/// * `samples` - Interleaved linear samples in [-1.0, 1.0]
/// * `sample_rate` - Declared rate (Hz)
/// * `channels` - 1 or 2
///
/// # Returns
/// `44 + 2 * samples.len()` bytes (a trailing partial stereo frame is
/// dropped). Empty input yields a bare header with a zero data length.
pub fn encode_wav(
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
) -> Result<Vec<u8>, PipelineError> {
    if sample_rate == 0 {
        return Err(PipelineError::config(
            "wav.sample_rate",
            "must be greater than 0",
        ));
    }
    if channels == 0 || channels > MAX_CHANNELS {
        return Err(PipelineError::config(
            "wav.channels",
            format!("must be 1 or 2 (got {})", channels),
        ));
    }

    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };

    // A trailing partial frame cannot be represented in the container
    let whole_frames = samples.len() - samples.len() % channels as usize;
    let samples = &samples[..whole_frames];

    let mut bytes = Vec::with_capacity(WAV_HEADER_LEN + samples.len() * 2);
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)?;
        for &sample in samples {
            writer.write_sample(pcm16_from_f32(sample))?;
        }
        writer.finalize()?;
    }

    Ok(bytes)
}
