//! Playback-related type definitions
//!
//! Supporting types for transport state and notification classification.

use serde::{Deserialize, Serialize};

/// Transport state of a live session
///
/// Single source of truth for the transport. Transitions:
/// - `Stopped → Loading` on play
/// - `Loading → Playing` once the lead buffer is primed
/// - `Playing → Loading` on underrun
/// - `Playing → Paused` on pause or a recoverable error
/// - any → `Stopped` on stop or a fatal connection error
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Loading,
    Playing,
    Paused,
}

impl PlaybackState {
    /// Whether incoming audio is consumed in this state
    ///
    /// `Stopped` and `Paused` discard chunks without decoding them.
    pub fn accepts_audio(self) -> bool {
        matches!(self, PlaybackState::Loading | PlaybackState::Playing)
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "stopped"),
            PlaybackState::Loading => write!(f, "loading"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

/// Classification of user-visible error notifications
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// No active prompts (recoverable, forces pause)
    Configuration,
    /// Prompt update or session command rejected (recoverable, forces pause)
    Transport,
    /// Connection error or close (fatal for the session, forces stop)
    Connection,
    /// Recording precondition or finalize failure
    Recording,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::Transport => write!(f, "transport"),
            ErrorKind::Connection => write!(f, "connection"),
            ErrorKind::Recording => write!(f, "recording"),
        }
    }
}
