//! Event types for the Prompt DJ notification system
//!
//! Provides the outbound notification enum and the EventBus that carries it
//! from the live session controller to the HTTP/SSE layer (and to tests).

mod playback_types;

pub use playback_types::{ErrorKind, PlaybackState};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;

/// Notifications emitted by the live session core
///
/// Every user-visible outcome is delivered as one of these; the controller
/// never returns errors across its public boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LiveEvent {
    /// Transport state changed
    ///
    /// Emitted on every transition, including `Loading → Loading` when an
    /// underrun forces re-priming.
    PlaybackStateChanged {
        /// State before change
        old_state: PlaybackState,
        /// State after change
        new_state: PlaybackState,
        /// When state changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Recording started or stopped
    RecordingStateChanged {
        /// True while capture is active
        recording: bool,
        /// When recording state changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The remote service rejected a prompt
    FilteredPrompt {
        /// Prompt text as sent
        text: String,
        /// Human-readable reason supplied by the service
        filtered_reason: String,
        /// When the rejection arrived
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// User-visible error
    Error {
        /// Error classification
        kind: ErrorKind,
        /// Human-readable message
        message: String,
        /// When the error occurred
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A finished recording was written out
    RecordingSaved {
        /// Location of the artifact
        path: PathBuf,
        /// Artifact size in bytes
        bytes: u64,
        /// When the artifact was written
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl LiveEvent {
    /// Event type name (matches the serde tag), used as the SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            LiveEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            LiveEvent::RecordingStateChanged { .. } => "RecordingStateChanged",
            LiveEvent::FilteredPrompt { .. } => "FilteredPrompt",
            LiveEvent::Error { .. } => "Error",
            LiveEvent::RecordingSaved { .. } => "RecordingSaved",
        }
    }

    /// Convenience constructor for `Error`
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        LiveEvent::Error {
            kind,
            message: message.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper around a tokio broadcast channel. Subscribers only receive
/// events emitted after they subscribe; slow subscribers may lag and lose the
/// oldest events.
pub struct EventBus {
    tx: broadcast::Sender<LiveEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use pdj_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: LiveEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
