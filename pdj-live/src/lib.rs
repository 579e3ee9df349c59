//! # Prompt DJ live session core (pdj-live)
//!
//! Streams weighted text prompts to a generative music service and plays the
//! returned audio segments back gaplessly.
//!
//! **Architecture:** decoder adapter → playback scheduler → output timeline,
//! driven by the session controller, which also owns the rate-limited prompt
//! dispatcher and the recording sidecar. An HTTP/SSE surface exposes the
//! controller's commands and notifications.

pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod recording;
pub mod session;

pub use config::{LiveConfig, SessionSettings};
pub use error::{Error, Result};
pub use session::{LiveMusicController, ReplayService};
