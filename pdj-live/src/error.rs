//! Error types for pdj-live
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//! These stay inside the crate: the session controller converts them into
//! `LiveEvent::Error` notifications instead of returning them to callers.

use thiserror::Error;

/// Main error type for pdj-live
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors bubbled up from pdj-common
    #[error(transparent)]
    Common(#[from] pdj_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Audio chunk decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Could not establish a session with the generation service
    #[error("Connection error: {0}")]
    Connection(String),

    /// A message to an established session was rejected
    #[error("{0}")]
    Transport(String),

    /// Recording could not be started or finalized
    #[error("Recording error: {0}")]
    Recording(String),

    /// Capture format not available in this build
    #[error("{0} recording is not supported in this build.")]
    UnsupportedFormat(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Session log (replay) parse errors
    #[error("Session log error: {0}")]
    SessionLog(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using pdj-live Error
pub type Result<T> = std::result::Result<T, Error>;
