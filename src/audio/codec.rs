//! # Audio Codec Helpers
//!
//! Conversions between the sample format audio is captured and played in
//! (`f32` in `[-1.0, 1.0]`) and the format it travels in (16-bit signed
//! little-endian PCM, mono, base64-encoded inside a JSON envelope).
//!
//! ## Rates:
//! - capture / upstream input: 16 kHz
//! - synthesized output: 24 kHz
//!
//! Both are fixed by the upstream service. Nothing is resampled here.

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;
use std::time::Duration;

pub const INPUT_SAMPLE_RATE: u32 = 16_000;
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// Samples per captured frame (256 ms at 16 kHz).
pub const CAPTURE_FRAME_SAMPLES: usize = 4096;

/// MIME type attached to every forwarded capture frame.
pub const INPUT_MIME_TYPE: &str = "audio/pcm;rate=16000";

/// Decoded audio ready for a playback sink.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayableBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl PlayableBuffer {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Largest difference between a sample in [-1, 1] and the same sample after
/// `float_to_pcm16` then `pcm16_to_float`, in units of 1/32768.
///
/// Rounding contributes half a step. Non-negative samples are scaled by
/// 32767 but restored by 32768, which adds up to `x / 32768` more, so the
/// full step bound only holds for `|x| <= 0.5` and the worst case, near
/// full scale, is one and a half steps.
pub const ROUND_TRIP_MAX_ERROR: f32 = 1.5 / 32768.0;

/// Clamp, scale and round one sample. The asymmetric scale maps -1.0 to
/// -32768 and 1.0 to 32767 without overflow.
pub fn float_to_pcm16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 32768.0).round() as i16
    } else {
        (clamped * 32767.0).round() as i16
    }
}

pub fn pcm16_to_float(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// Pack samples as 16-bit little-endian PCM.
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        // writing into a Vec cannot fail
        let _ = bytes.write_i16::<LittleEndian>(float_to_pcm16(sample));
    }
    bytes
}

/// Capture frame → base64 text for an `audio` envelope.
pub fn encode_frame(samples: &[f32]) -> String {
    STANDARD.encode(encode_pcm16(samples))
}

/// Base64 text from an `audio` envelope → 24 kHz playable buffer.
pub fn decode_frame(data: &str) -> Result<PlayableBuffer> {
    let bytes = STANDARD.decode(data).context("Audio payload is not valid base64")?;
    Ok(PlayableBuffer {
        samples: decode_pcm16(&bytes)?,
        sample_rate: OUTPUT_SAMPLE_RATE,
    })
}

pub fn decode_pcm16(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 2 != 0 {
        bail!("PCM16 payload has an odd byte count ({})", bytes.len());
    }

    let mut cursor = Cursor::new(bytes);
    let mut samples = Vec::with_capacity(bytes.len() / 2);
    while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
        samples.push(pcm16_to_float(sample));
    }
    Ok(samples)
}
