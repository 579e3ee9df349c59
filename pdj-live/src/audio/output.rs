//! Audio output abstraction
//!
//! The session controller only needs four things from the output: a
//! monotonic clock, a way to start segments at exact times against a gain
//! stage, capture taps, and "resume". `HeadlessOutput` provides these from a
//! software clock; `DeviceOutput` (feature `device`) drives the same timeline
//! from a cpal callback.

use crate::audio::timeline::{CaptureTap, TapId, Timeline, VoiceInfo};
use crate::audio::{AudioSegment, GainStage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Output timeline as seen by the session controller
pub trait AudioOutput: Send + Sync {
    /// Output clock in seconds (monotonic)
    fn current_time(&self) -> f64;

    /// Make sure the output is running
    fn resume(&self);

    /// Start `segment` at `start_at` seconds through `stage`
    fn schedule(&self, segment: AudioSegment, start_at: f64, stage: &Arc<GainStage>);

    /// Tap the post-gain output of `stage`
    fn attach_tap(&self, stage: &Arc<GainStage>) -> CaptureTap;

    /// Remove a tap; its channel closes
    fn detach_tap(&self, tap: TapId);

    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;
}

pub(crate) fn lock_timeline(timeline: &Mutex<Timeline>) -> MutexGuard<'_, Timeline> {
    match timeline.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Output driven by a software clock
///
/// The clock is `tokio::time::Instant` based, so tests running with paused
/// time control it exactly. Audio is rendered into a null sink by `pump()`;
/// capture taps still receive every block.
pub struct HeadlessOutput {
    origin: Instant,
    timeline: Mutex<Timeline>,
    resumed: AtomicBool,
}

impl HeadlessOutput {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        info!(
            "Headless audio output: {} Hz, {} channels",
            sample_rate, channels
        );
        Self {
            origin: Instant::now(),
            timeline: Mutex::new(Timeline::new(sample_rate, channels)),
            resumed: AtomicBool::new(false),
        }
    }

    /// Render everything up to the current clock position
    pub fn pump(&self) {
        let mut timeline = lock_timeline(&self.timeline);
        let target = (self.current_time() * timeline.sample_rate() as f64) as u64;
        let rendered = timeline.frames_rendered();
        if target > rendered {
            timeline.render_frames(target - rendered);
        }
    }

    /// Spawn the background render loop
    pub fn spawn_pump(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let output = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            debug!("Headless render loop started ({:?} interval)", interval);
            loop {
                ticker.tick().await;
                output.pump();
            }
        })
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed.load(Ordering::Relaxed)
    }

    /// Voices not yet fully rendered
    pub fn scheduled(&self) -> Vec<VoiceInfo> {
        lock_timeline(&self.timeline).voices()
    }

    pub fn tap_count(&self) -> usize {
        lock_timeline(&self.timeline).tap_count()
    }
}

impl AudioOutput for HeadlessOutput {
    fn current_time(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn resume(&self) {
        if !self.resumed.swap(true, Ordering::Relaxed) {
            debug!("Headless output resumed");
        }
    }

    fn schedule(&self, segment: AudioSegment, start_at: f64, stage: &Arc<GainStage>) {
        lock_timeline(&self.timeline).schedule(segment, start_at, Arc::clone(stage));
    }

    fn attach_tap(&self, stage: &Arc<GainStage>) -> CaptureTap {
        lock_timeline(&self.timeline).attach_tap(stage.id())
    }

    fn detach_tap(&self, tap: TapId) {
        lock_timeline(&self.timeline).detach_tap(tap);
    }

    fn sample_rate(&self) -> u32 {
        lock_timeline(&self.timeline).sample_rate()
    }

    fn channels(&self) -> u16 {
        lock_timeline(&self.timeline).channels()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_clock_follows_tokio_time() {
        let output = HeadlessOutput::new(48_000, 2);
        assert!(output.current_time() < 1e-9);

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!((output.current_time() - 1.5).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pump_renders_to_clock() {
        let output = HeadlessOutput::new(1000, 2);
        let stage = Arc::new(GainStage::new());
        output.schedule(AudioSegment::silence(100, 1000, 2), 0.0, &stage);
        assert_eq!(output.scheduled().len(), 1);

        tokio::time::advance(Duration::from_millis(200)).await;
        output.pump();
        assert!(output.scheduled().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tap_fed_by_pump() {
        let output = HeadlessOutput::new(1000, 2);
        let stage = Arc::new(GainStage::new());
        let mut tap = output.attach_tap(&stage);
        output.schedule(AudioSegment::new(vec![0.5; 20], 1000, 2), 0.0, &stage);

        tokio::time::advance(Duration::from_millis(10)).await;
        output.pump();

        let block = tap.rx.try_recv().unwrap();
        assert_eq!(block.len(), 20);
        assert!(block.iter().all(|&s| s == 0.5));

        output.detach_tap(tap.id);
        assert_eq!(output.tap_count(), 0);
    }

    #[tokio::test]
    async fn test_resume_flag() {
        let output = HeadlessOutput::new(48_000, 2);
        assert!(!output.is_resumed());
        output.resume();
        output.resume();
        assert!(output.is_resumed());
    }
}
