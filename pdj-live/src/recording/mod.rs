//! Recording sidecar
//!
//! Captures the post-gain output of the current gain stage while transport
//! is playing or loading. A capture tap feeds interleaved blocks to a capture
//! task, which keeps them as PCM16 byte fragments in arrival order. Stopping
//! detaches the tap; the capture task then drains, and a finalize task turns
//! the fragments into one artifact named `<prefix>-YYYY-MM-DD_HH-MM-SS.<ext>`.
//!
//! The controller owns one `Recorder` and forces it to stop on pause/stop, so
//! a recording never outlives playback.

pub mod artifact;

pub use artifact::{assemble_wav, ArtifactSink, DirectorySink};

use crate::audio::decode::pcm16_bytes;
use crate::audio::{AudioOutput, GainStage, TapId};
use crate::error::{Error, Result};
use pdj_common::events::{ErrorKind, EventBus, LiveEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Capture container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptureFormat {
    #[default]
    Wav,
    Webm,
}

impl CaptureFormat {
    /// Whether this build can produce the format
    pub fn is_supported(self) -> bool {
        matches!(self, CaptureFormat::Wav)
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            CaptureFormat::Wav => "audio/wav",
            CaptureFormat::Webm => "audio/webm",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            CaptureFormat::Wav => "wav",
            CaptureFormat::Webm => "webm",
        }
    }

    /// Name used in user-facing messages
    pub fn label(self) -> &'static str {
        match self {
            CaptureFormat::Wav => "WAV",
            CaptureFormat::Webm => "WebM",
        }
    }
}

struct ActiveRecording {
    tap: TapId,
    capture: JoinHandle<Vec<Vec<u8>>>,
}

/// Recording state machine: idle or capturing
pub struct Recorder {
    format: CaptureFormat,
    prefix: String,
    sink: Arc<dyn ArtifactSink>,
    active: Option<ActiveRecording>,
}

impl Recorder {
    pub fn new(format: CaptureFormat, prefix: impl Into<String>, sink: Arc<dyn ArtifactSink>) -> Self {
        Self {
            format,
            prefix: prefix.into(),
            sink,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Start capturing the output of `stage`
    ///
    /// Transport preconditions are the caller's concern.
    ///
    /// # Errors
    /// - `UnsupportedFormat` if this build cannot produce the capture format
    /// - `Recording` if already recording
    pub fn start(&mut self, output: &Arc<dyn AudioOutput>, stage: &Arc<GainStage>) -> Result<()> {
        if self.active.is_some() {
            return Err(Error::Recording("already recording".to_string()));
        }
        if !self.format.is_supported() {
            return Err(Error::UnsupportedFormat(self.format.label().to_string()));
        }

        let mut tap = output.attach_tap(stage);
        let capture = tokio::spawn(async move {
            let mut fragments = Vec::new();
            while let Some(block) = tap.rx.recv().await {
                if !block.is_empty() {
                    fragments.push(pcm16_bytes(&block));
                }
            }
            fragments
        });

        info!(
            "Recording started ({}, gain stage {})",
            self.format.label(),
            stage.id()
        );
        self.active = Some(ActiveRecording {
            tap: tap.id,
            capture,
        });
        Ok(())
    }

    /// Stop capturing; returns false if nothing was recording
    ///
    /// Finalization runs in the background and reports through `events`
    /// (`RecordingSaved` or a recording error).
    pub fn stop(&mut self, output: &Arc<dyn AudioOutput>, events: &Arc<EventBus>) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        output.detach_tap(active.tap);
        info!("Recording stopped, finalizing");

        let sink = Arc::clone(&self.sink);
        let events = Arc::clone(events);
        let file_name = pdj_common::time::artifact_filename(
            &self.prefix,
            pdj_common::time::now(),
            self.format.extension(),
        );
        let sample_rate = output.sample_rate();
        let channels = output.channels();

        tokio::spawn(async move {
            let result = finalize(active.capture, sink, &file_name, sample_rate, channels).await;
            match result {
                Ok((path, bytes)) => events.emit_lossy(LiveEvent::RecordingSaved {
                    path,
                    bytes,
                    timestamp: chrono::Utc::now(),
                }),
                Err(e) => {
                    error!("Failed to finalize recording: {}", e);
                    events.emit_lossy(LiveEvent::error(ErrorKind::Recording, e.to_string()));
                }
            }
        });
        true
    }
}

async fn finalize(
    capture: JoinHandle<Vec<Vec<u8>>>,
    sink: Arc<dyn ArtifactSink>,
    file_name: &str,
    sample_rate: u32,
    channels: u16,
) -> Result<(std::path::PathBuf, u64)> {
    let fragments = capture
        .await
        .map_err(|e| Error::Internal(format!("capture task failed: {}", e)))?;
    debug!("Assembling recording from {} fragments", fragments.len());

    let bytes = assemble_wav(&fragments, sample_rate, channels)?;
    let size = bytes.len() as u64;
    let path = sink.save(file_name, bytes).await?;
    Ok((path, size))
}
