//! Session lifecycle
//!
//! Service interface, wire format, session log replay, the memoized
//! connection and the controller tying them to the audio output.

pub mod connection;
pub mod controller;
pub mod replay;
pub mod service;
pub mod wire;

pub use controller::{ControllerStatus, DispatchOutcome, LiveMusicController};
pub use replay::ReplayService;
pub use service::{AudioChunk, MusicService, MusicSession, ServiceEvent, ServiceEventSink, SessionCommand};
