//! Output timeline renderer
//!
//! Holds every scheduled segment ("voice") with its start frame and the gain
//! stage it was scheduled against, and renders them into interleaved output
//! blocks. The number of frames rendered so far is the output clock.
//!
//! Capture taps are bound to one gain stage: each rendered block also yields
//! the post-gain mix of that stage's voices, sent to the tap's channel.

use crate::audio::gain::{GainCurve, StageId};
use crate::audio::{AudioSegment, GainStage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Identifier of a capture tap
pub type TapId = u64;

/// Receiving end of a capture tap: post-gain interleaved blocks
#[derive(Debug)]
pub struct CaptureTap {
    pub id: TapId,
    pub rx: mpsc::UnboundedReceiver<Vec<f32>>,
}

struct Voice {
    start_frame: u64,
    segment: AudioSegment,
    stage: Arc<GainStage>,
}

impl Voice {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.segment.frames() as u64
    }
}

struct Tap {
    id: TapId,
    stage_id: StageId,
    tx: mpsc::UnboundedSender<Vec<f32>>,
}

/// Summary of a scheduled voice (for diagnostics and tests)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceInfo {
    pub start_time: f64,
    pub duration: f64,
    pub stage_id: StageId,
}

/// Sample-accurate output timeline
pub struct Timeline {
    sample_rate: u32,
    channels: u16,
    frames_rendered: u64,
    voices: Vec<Voice>,
    taps: Vec<Tap>,
    next_tap_id: TapId,
    scratch: Vec<f32>,
}

impl Timeline {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
            frames_rendered: 0,
            voices: Vec::new(),
            taps: Vec::new(),
            next_tap_id: 1,
            scratch: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Output clock in seconds
    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    /// Schedule a segment to start at `start_time` seconds
    ///
    /// A start time already behind the render cursor plays the remainder of
    /// the segment from the cursor on.
    pub fn schedule(&mut self, segment: AudioSegment, start_time: f64, stage: Arc<GainStage>) {
        if segment.sample_rate() != self.sample_rate {
            warn!(
                "Segment sample rate {} differs from output rate {}",
                segment.sample_rate(),
                self.sample_rate
            );
        }
        let start_frame = (start_time.max(0.0) * self.sample_rate as f64).round() as u64;
        if start_frame < self.frames_rendered {
            debug!(
                "Segment scheduled {} frames behind the render cursor",
                self.frames_rendered - start_frame
            );
        }
        self.voices.push(Voice {
            start_frame,
            segment,
            stage,
        });
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn voices(&self) -> Vec<VoiceInfo> {
        self.voices
            .iter()
            .map(|v| VoiceInfo {
                start_time: v.start_frame as f64 / self.sample_rate as f64,
                duration: v.segment.duration(),
                stage_id: v.stage.id(),
            })
            .collect()
    }

    pub fn attach_tap(&mut self, stage_id: StageId) -> CaptureTap {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_tap_id;
        self.next_tap_id += 1;
        self.taps.push(Tap { id, stage_id, tx });
        debug!("Capture tap {} attached to gain stage {}", id, stage_id);
        CaptureTap { id, rx }
    }

    /// Remove a tap; its receiver sees the channel close
    pub fn detach_tap(&mut self, id: TapId) -> bool {
        let before = self.taps.len();
        self.taps.retain(|t| t.id != id);
        before != self.taps.len()
    }

    pub fn tap_count(&self) -> usize {
        self.taps.len()
    }

    /// Render `out.len() / channels` frames into `out` (interleaved)
    pub fn render(&mut self, out: &mut [f32]) {
        let channels = self.channels as usize;
        let frames = out.len() / channels;
        let out = &mut out[..frames * channels];
        out.fill(0.0);

        let block_start = self.frames_rendered;
        let block_end = block_start + frames as u64;
        let rate = self.sample_rate as f64;

        let mut tap_buffers: Vec<Vec<f32>> = self.taps.iter().map(|_| vec![0.0; out.len()]).collect();
        let mut curves: HashMap<StageId, GainCurve> = HashMap::new();

        for voice in &self.voices {
            let from = voice.start_frame.max(block_start);
            let to = voice.end_frame().min(block_end);
            if from >= to {
                continue;
            }
            let stage_id = voice.stage.id();
            let curve = curves
                .entry(stage_id)
                .or_insert_with(|| voice.stage.snapshot());

            for frame in from..to {
                let gain = curve.value_at(frame as f64 / rate);
                let voice_frame = (frame - voice.start_frame) as usize;
                let out_base = (frame - block_start) as usize * channels;
                for ch in 0..channels {
                    let sample = voice.segment.sample(voice_frame, ch) * gain;
                    out[out_base + ch] += sample;
                    for (tap, buffer) in self.taps.iter().zip(tap_buffers.iter_mut()) {
                        if tap.stage_id == stage_id {
                            buffer[out_base + ch] += sample;
                        }
                    }
                }
            }
        }

        // A tap whose receiver is gone is detached
        let mut closed = Vec::new();
        for (tap, buffer) in self.taps.iter().zip(tap_buffers) {
            if tap.tx.send(buffer).is_err() {
                closed.push(tap.id);
            }
        }
        for id in closed {
            self.detach_tap(id);
        }

        self.frames_rendered = block_end;
        self.voices.retain(|v| v.end_frame() > block_end);
    }

    /// Advance the clock by `frames`, discarding the mix (taps still fed)
    pub fn render_frames(&mut self, frames: u64) {
        const BLOCK: u64 = 4800;
        let mut scratch = std::mem::take(&mut self.scratch);
        let mut remaining = frames;
        while remaining > 0 {
            let n = remaining.min(BLOCK) as usize;
            scratch.resize(n * self.channels as usize, 0.0);
            self.render(&mut scratch);
            remaining -= n as u64;
        }
        self.scratch = scratch;
    }
}
