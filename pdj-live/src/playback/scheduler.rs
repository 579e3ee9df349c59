//! Gapless segment scheduler
//!
//! Owns the schedule clock (`next_start_time`): the output time at which the
//! next segment must start so that it follows the previous one without a gap.
//!
//! # Placement
//!
//! For each decoded segment of duration `d` arriving at output time `now`:
//! 1. No schedule yet (first segment after a (re)start): the clock is set to
//!    `now + buffer_time`, giving the network a fixed lead to catch up.
//!    The caller starts the lead timer that flips `loading → playing`.
//! 2. Clock behind `now`: underrun. The clock is cleared and the segment is
//!    dropped; the next segment primes again.
//! 3. Otherwise the segment starts at the clock, which advances by `d`.
//!
//! A dropped segment is not requeued.

use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of offering one segment to the scheduler
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// First segment after a (re)start; schedule at `start` and arm the lead timer
    Primed { start: f64 },
    /// Schedule at `start`, directly after the previous segment
    Scheduled { start: f64 },
    /// Schedule fell behind real time; segment dropped, clock cleared
    Underrun { behind: f64 },
}

impl Placement {
    /// Start time, if the segment is to be played
    pub fn start(&self) -> Option<f64> {
        match *self {
            Placement::Primed { start } | Placement::Scheduled { start } => Some(start),
            Placement::Underrun { .. } => None,
        }
    }
}

/// Schedule clock for back-to-back playback
#[derive(Debug, Clone)]
pub struct PlaybackScheduler {
    /// None = no schedule established yet
    next_start_time: Option<f64>,
    buffer_time: f64,
}

impl PlaybackScheduler {
    pub fn new(buffer_time: Duration) -> Self {
        Self {
            next_start_time: None,
            buffer_time: buffer_time.as_secs_f64(),
        }
    }

    pub fn next_start_time(&self) -> Option<f64> {
        self.next_start_time
    }

    pub fn is_primed(&self) -> bool {
        self.next_start_time.is_some()
    }

    /// Forget the schedule; the next segment primes the lead buffer again
    pub fn reset(&mut self) {
        self.next_start_time = None;
    }

    /// Decide where a segment of `duration` seconds arriving at `now` goes
    pub fn place(&mut self, now: f64, duration: f64) -> Placement {
        let (start, primed) = match self.next_start_time {
            None => {
                let start = now + self.buffer_time;
                debug!(
                    "Priming lead buffer: first segment at {:.3}s (now {:.3}s)",
                    start, now
                );
                (start, true)
            }
            Some(next) if next < now => {
                warn!(
                    "Playback underrun: schedule {:.3}s behind output clock, re-priming",
                    now - next
                );
                self.next_start_time = None;
                return Placement::Underrun { behind: now - next };
            }
            Some(next) => (next, false),
        };

        self.next_start_time = Some(start + duration);
        if primed {
            Placement::Primed { start }
        } else {
            Placement::Scheduled { start }
        }
    }
}
