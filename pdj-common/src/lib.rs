//! # Prompt DJ Common Library
//!
//! Shared code for the Prompt DJ live session crates:
//! - Error types
//! - Event types (LiveEvent enum) and the EventBus
//! - Prompt model and the default prompt bank
//! - Configuration file discovery
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod prompts;
pub mod time;

pub use error::{Error, Result};
pub use events::{EventBus, LiveEvent, PlaybackState};
pub use prompts::{Prompt, PromptSet, WeightedPrompt};
