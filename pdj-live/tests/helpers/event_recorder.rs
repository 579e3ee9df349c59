//! Collects controller notifications for assertions

use pdj_common::events::{ErrorKind, LiveEvent, PlaybackState};
use tokio::sync::broadcast;

pub struct EventRecorder {
    rx: broadcast::Receiver<LiveEvent>,
    seen: Vec<LiveEvent>,
}

impl EventRecorder {
    pub fn new(rx: broadcast::Receiver<LiveEvent>) -> Self {
        Self { rx, seen: Vec::new() }
    }

    /// Pull everything currently queued; returns all events seen so far
    pub fn drain(&mut self) -> &[LiveEvent] {
        while let Ok(event) = self.rx.try_recv() {
            self.seen.push(event);
        }
        &self.seen
    }

    /// Forget what has been seen
    pub fn reset(&mut self) {
        self.drain();
        self.seen.clear();
    }

    pub fn states(&mut self) -> Vec<PlaybackState> {
        self.drain()
            .iter()
            .filter_map(|e| match e {
                LiveEvent::PlaybackStateChanged { new_state, .. } => Some(*new_state),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&mut self) -> Vec<(ErrorKind, String)> {
        self.drain()
            .iter()
            .filter_map(|e| match e {
                LiveEvent::Error { kind, message, .. } => Some((*kind, message.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn recording_flags(&mut self) -> Vec<bool> {
        self.drain()
            .iter()
            .filter_map(|e| match e {
                LiveEvent::RecordingStateChanged { recording, .. } => Some(*recording),
                _ => None,
            })
            .collect()
    }

    /// Event type names in order (e.g. "RecordingStateChanged")
    pub fn kinds(&mut self) -> Vec<&'static str> {
        self.drain().iter().map(|e| e.event_type()).collect()
    }

    /// Wait for the next event matching `pred` (skipping others)
    pub async fn wait_for(&mut self, pred: impl Fn(&LiveEvent) -> bool) -> LiveEvent {
        loop {
            let event = self.rx.recv().await.expect("event bus closed");
            self.seen.push(event.clone());
            if pred(&event) {
                return event;
            }
        }
    }
}
