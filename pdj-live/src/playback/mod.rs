//! Playback scheduling and prompt dispatch

pub mod scheduler;
pub mod throttle;

pub use scheduler::{PlaybackScheduler, Placement};
pub use throttle::{Throttle, ThrottleAction};
