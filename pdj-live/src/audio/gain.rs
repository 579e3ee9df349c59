//! Output gain stage with scheduled automation
//!
//! Models a gain node whose value follows a list of automation events on the
//! output timeline:
//! - `set_value_at_time(v, t)`: jump to `v` at `t`
//! - `linear_ramp_to_value_at_time(v, t)`: ramp linearly from the previous
//!   event's value/time to `v`, arriving at `t`
//!
//! The live session owns exactly one current stage. Every segment is scheduled
//! against the stage that was current when it was scheduled, so replacing the
//! stage on pause/stop leaves the old stage's fade-out attached to the old
//! segments and nothing of it reaches the new stage.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

static NEXT_STAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a gain stage (unique per process)
pub type StageId = u64;

#[derive(Debug, Clone, Copy, PartialEq)]
enum GainEvent {
    Set { value: f32, at: f64 },
    Ramp { value: f32, end: f64 },
}

impl GainEvent {
    fn time(&self) -> f64 {
        match *self {
            GainEvent::Set { at, .. } => at,
            GainEvent::Ramp { end, .. } => end,
        }
    }
}

/// Automation curve: default value plus time-ordered events
#[derive(Debug, Clone, PartialEq)]
pub struct GainCurve {
    default_value: f32,
    events: Vec<GainEvent>,
}

impl GainCurve {
    fn new(default_value: f32) -> Self {
        Self {
            default_value,
            events: Vec::new(),
        }
    }

    fn insert(&mut self, event: GainEvent) {
        // Stable insertion: equal times keep call order
        let idx = self
            .events
            .iter()
            .position(|e| e.time() > event.time())
            .unwrap_or(self.events.len());
        self.events.insert(idx, event);
    }

    /// Gain value at output time `t` (seconds)
    pub fn value_at(&self, t: f64) -> f32 {
        let mut prev_time = 0.0;
        let mut prev_value = self.default_value;

        for event in &self.events {
            match *event {
                GainEvent::Set { value, at } => {
                    if at > t {
                        return prev_value;
                    }
                    prev_time = at;
                    prev_value = value;
                }
                GainEvent::Ramp { value, end } => {
                    if end > t {
                        if t <= prev_time || end <= prev_time {
                            return prev_value;
                        }
                        let progress = ((t - prev_time) / (end - prev_time)) as f32;
                        return prev_value + (value - prev_value) * progress;
                    }
                    prev_time = end;
                    prev_value = value;
                }
            }
        }
        prev_value
    }
}

/// Gain node on the output timeline
#[derive(Debug)]
pub struct GainStage {
    id: StageId,
    curve: Mutex<GainCurve>,
}

impl GainStage {
    /// New stage at unity gain with no automation
    pub fn new() -> Self {
        Self {
            id: NEXT_STAGE_ID.fetch_add(1, Ordering::Relaxed),
            curve: Mutex::new(GainCurve::new(1.0)),
        }
    }

    pub fn id(&self) -> StageId {
        self.id
    }

    pub fn set_value_at_time(&self, value: f32, at: f64) {
        self.with_curve(|c| c.insert(GainEvent::Set { value, at }));
    }

    pub fn linear_ramp_to_value_at_time(&self, value: f32, end: f64) {
        self.with_curve(|c| c.insert(GainEvent::Ramp { value, end }));
    }

    /// Jump to `from` at `now` and ramp to `to` over `duration` seconds
    pub fn fade(&self, from: f32, to: f32, now: f64, duration: f64) {
        self.set_value_at_time(from, now);
        self.linear_ramp_to_value_at_time(to, now + duration);
    }

    pub fn value_at(&self, t: f64) -> f32 {
        self.snapshot().value_at(t)
    }

    /// Copy of the automation curve (for rendering a block without holding the lock)
    pub fn snapshot(&self) -> GainCurve {
        match self.curve.lock() {
            Ok(curve) => curve.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn with_curve(&self, f: impl FnOnce(&mut GainCurve)) {
        match self.curve.lock() {
            Ok(mut curve) => f(&mut curve),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl Default for GainStage {
    fn default() -> Self {
        Self::new()
    }
}
