//! Core audio data types
//!
//! Defines the decoded segment type produced by the decoder adapter and
//! consumed exactly once by the playback scheduler.

use std::sync::Arc;

/// One decoded chunk of generated audio.
///
/// **Format:**
/// - Samples are f32 (floating point -1.0 to 1.0)
/// - Interleaved: [L, R, L, R, ...] for stereo
/// - Sample data is shared (`Arc`) so scheduling never copies it
#[derive(Debug, Clone)]
pub struct AudioSegment {
    /// PCM audio samples (interleaved)
    samples: Arc<[f32]>,

    /// Sample rate in Hz
    sample_rate: u32,

    /// Channel count
    channels: u16,
}

impl AudioSegment {
    /// Create a segment from interleaved samples
    ///
    /// A trailing partial frame is truncated.
    pub fn new(mut samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() - samples.len() % channels as usize;
        samples.truncate(whole);
        Self {
            samples: samples.into(),
            sample_rate,
            channels,
        }
    }

    /// Silent segment of the given length (used by tests and benches)
    pub fn silence(frames: usize, sample_rate: u32, channels: u16) -> Self {
        Self::new(vec![0.0; frames * channels as usize], sample_rate, channels)
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample for `channel` at `frame`, or 0.0 past the end
    ///
    /// Mono segments feed every output channel.
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        let channel = if self.channels == 1 { 0 } else { channel };
        if channel >= self.channels as usize {
            return 0.0;
        }
        self.samples
            .get(frame * self.channels as usize + channel)
            .copied()
            .unwrap_or(0.0)
    }
}
