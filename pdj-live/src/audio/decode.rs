//! Decoder adapter for streamed audio chunks
//!
//! The generation service delivers each chunk as base64 text wrapping raw
//! interleaved signed 16-bit little-endian PCM at a fixed rate and channel
//! count.
//!
//! # Sample Format
//!
//! - Input: s16le, interleaved
//! - Output: f32 in [-1.0, 1.0), interleaved, same channel layout
//!
//! The adapter is consumed through the `SegmentDecoder` trait so the session
//! controller never depends on the wire encoding.

use crate::audio::AudioSegment;
use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Turns one encoded chunk into a playable segment
pub trait SegmentDecoder: Send + Sync {
    fn decode_segment(&self, data: &str) -> Result<AudioSegment>;
}

/// Decode base64 chunk payload into raw bytes
pub fn decode(data: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(data.trim())
        .map_err(|e| Error::Decode(format!("invalid base64 payload: {}", e)))
}

/// Interpret raw s16le bytes as an interleaved segment
///
/// # Errors
/// - odd byte count (truncated sample)
/// - byte count not a whole number of frames
pub fn decode_audio_data(raw: &[u8], sample_rate: u32, channels: u16) -> Result<AudioSegment> {
    if raw.len() % 2 != 0 {
        return Err(Error::Decode(format!(
            "PCM payload has odd length {}",
            raw.len()
        )));
    }
    let sample_count = raw.len() / 2;
    if channels == 0 || sample_count % channels as usize != 0 {
        return Err(Error::Decode(format!(
            "{} samples is not a whole number of {}-channel frames",
            sample_count, channels
        )));
    }

    let samples = raw
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();

    Ok(AudioSegment::new(samples, sample_rate, channels))
}

/// Base64 + s16le PCM decoder at a fixed format
#[derive(Debug, Clone)]
pub struct Pcm16Decoder {
    sample_rate: u32,
    channels: u16,
}

impl Pcm16Decoder {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }
}

impl SegmentDecoder for Pcm16Decoder {
    fn decode_segment(&self, data: &str) -> Result<AudioSegment> {
        let raw = decode(data)?;
        decode_audio_data(&raw, self.sample_rate, self.channels)
    }
}

/// Encode f32 samples as base64 s16le (inverse of `Pcm16Decoder`)
///
/// Used to produce session logs and test fixtures.
pub fn encode_pcm16(samples: &[f32]) -> String {
    STANDARD.encode(pcm16_bytes(samples))
}

/// Convert f32 samples into s16le bytes, clamping to the valid range
pub fn pcm16_bytes(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}
