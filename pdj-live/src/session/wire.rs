//! Server message wire format
//!
//! JSON messages as sent by the generation service (camelCase keys). One
//! message may carry several parts; they convert to `ServiceEvent`s in the
//! order setup, filtered prompt, audio.
//!
//! ```json
//! {"setupComplete": {}}
//! {"filteredPrompt": {"text": "...", "filteredReason": "..."}}
//! {"serverContent": {"audioChunks": [{"data": "<base64>", "mimeType": "audio/l16;rate=48000;channels=2"}]}}
//! ```

use crate::session::service::{AudioChunk, ServiceEvent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_complete: Option<SetupComplete>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtered_prompt: Option<FilteredPrompt>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_content: Option<ServerContent>,
}

/// Empty marker object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetupComplete {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredPrompt {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub filtered_reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub audio_chunks: Vec<WireAudioChunk>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAudioChunk {
    #[serde(default)]
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ServerMessage {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Message carrying only audio
    pub fn audio(chunks: Vec<WireAudioChunk>) -> Self {
        Self {
            server_content: Some(ServerContent {
                audio_chunks: chunks,
            }),
            ..Default::default()
        }
    }

    /// Convert into controller events (possibly none)
    pub fn into_events(self) -> Vec<ServiceEvent> {
        let mut events = Vec::new();
        if self.setup_complete.is_some() {
            events.push(ServiceEvent::SetupComplete);
        }
        if let Some(filtered) = self.filtered_prompt {
            events.push(ServiceEvent::FilteredPrompt {
                text: filtered.text,
                reason: filtered.filtered_reason,
            });
        }
        if let Some(content) = self.server_content {
            if !content.audio_chunks.is_empty() {
                events.push(ServiceEvent::AudioChunks(
                    content
                        .audio_chunks
                        .into_iter()
                        .map(|c| AudioChunk {
                            data: c.data,
                            mime_type: c.mime_type,
                        })
                        .collect(),
                ));
            }
        }
        events
    }
}
