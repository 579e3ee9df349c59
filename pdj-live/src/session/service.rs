//! Generation service interface
//!
//! The remote music-generation service is an external collaborator. The
//! controller talks to it through two traits: `MusicService` opens sessions and
//! `MusicSession` carries commands to an open one. Inbound traffic (setup,
//! filtered prompts, audio, error, close) arrives as `ServiceEvent`s on the
//! channel handed to `connect`.

use crate::error::Result;
use async_trait::async_trait;
use pdj_common::WeightedPrompt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One encoded audio chunk as delivered by the service
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Opaque encoded payload (base64 text)
    pub data: String,
    pub mime_type: Option<String>,
}

/// Inbound event from an open session
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceEvent {
    /// Service confirmed the session setup
    SetupComplete,
    /// A prompt was rejected
    FilteredPrompt { text: String, reason: String },
    /// Audio chunks, in stream order
    AudioChunks(Vec<AudioChunk>),
    /// Transport error (session is unusable)
    Error(String),
    /// Session closed by the service
    Closed,
}

/// Sending half handed to the service on connect
pub type ServiceEventSink = mpsc::UnboundedSender<ServiceEvent>;

/// Commands a session can receive (used by recording/replay sessions)
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    SetWeightedPrompts(Vec<WeightedPrompt>),
    Play,
    Pause,
    Stop,
}

/// An open session with the generation service
#[async_trait]
pub trait MusicSession: Send + Sync {
    async fn set_weighted_prompts(&self, prompts: Vec<WeightedPrompt>) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;
}

/// Factory for sessions
#[async_trait]
pub trait MusicService: Send + Sync {
    /// Open a session for `model`; events for it are sent to `events`
    async fn connect(&self, model: &str, events: ServiceEventSink) -> Result<Arc<dyn MusicSession>>;
}
