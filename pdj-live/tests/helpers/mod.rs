//! Test helper modules for pdj-live integration tests
//!
//! Provides reusable test infrastructure components:
//! - MockService / MockSession: scripted generation service
//! - DurationDecoder: chunk payload "250" decodes to 250 ms of audio
//! - EventRecorder: collects controller notifications
//! - Harness: controller wired to all of the above and a headless output

#![allow(dead_code)]

pub mod event_recorder;
pub mod mock_service;

pub use event_recorder::EventRecorder;
pub use mock_service::{audio_event, DurationDecoder, MockService, MockSession};

use pdj_common::events::EventBus;
use pdj_common::{Prompt, PromptSet};
use pdj_live::audio::HeadlessOutput;
use pdj_live::recording::{CaptureFormat, DirectorySink, Recorder};
use pdj_live::session::DispatchOutcome;
use pdj_live::{LiveMusicController, SessionSettings};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Output sample rate used by the harness (1 frame = 1 ms)
pub const SAMPLE_RATE: u32 = 1000;
pub const CHANNELS: u16 = 2;
pub const BUFFER_TIME: Duration = Duration::from_millis(500);
pub const FADE: Duration = Duration::from_millis(100);
pub const THROTTLE: Duration = Duration::from_millis(200);

pub fn test_settings() -> SessionSettings {
    SessionSettings {
        model: "test-model".to_string(),
        buffer_time: BUFFER_TIME,
        fade: FADE,
        throttle: THROTTLE,
        sample_rate: SAMPLE_RATE,
        channels: CHANNELS,
    }
}

pub fn prompt(id: &str, text: &str, weight: f64) -> Prompt {
    Prompt {
        prompt_id: id.to_string(),
        text: text.to_string(),
        weight,
        cc: 0,
        color: "#ffffff".to_string(),
    }
}

/// Set of `(text, weight)` pairs with generated ids
pub fn prompt_set(entries: &[(&str, f64)]) -> PromptSet {
    PromptSet::from_prompts(
        entries
            .iter()
            .enumerate()
            .map(|(i, (text, weight))| prompt(&format!("p{}", i), text, *weight))
            .collect(),
    )
    .expect("valid prompt set")
}

/// Controller wired to a mock service and a headless output
///
/// Tests using the harness run with paused time (`start_paused = true`):
/// the output clock only moves when the runtime advances it.
pub struct Harness {
    pub controller: LiveMusicController,
    pub service: Arc<MockService>,
    pub output: Arc<HeadlessOutput>,
    pub events: EventRecorder,
    pub recordings: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(MockService::new(), CaptureFormat::Wav)
    }

    pub fn with_service(service: MockService) -> Self {
        Self::build(service, CaptureFormat::Wav)
    }

    pub fn with_format(format: CaptureFormat) -> Self {
        Self::build(MockService::new(), format)
    }

    fn build(service: MockService, format: CaptureFormat) -> Self {
        let service = Arc::new(service);
        let output = Arc::new(HeadlessOutput::new(SAMPLE_RATE, CHANNELS));
        let recordings = TempDir::new().expect("temp dir");
        let recorder = Recorder::new(
            format,
            "test",
            Arc::new(DirectorySink::new(recordings.path())),
        );
        let bus = Arc::new(EventBus::new(1024));
        let events = EventRecorder::new(bus.subscribe());

        let controller = LiveMusicController::new(
            service.clone(),
            output.clone(),
            Arc::new(DurationDecoder {
                sample_rate: SAMPLE_RATE,
                channels: CHANNELS,
            }),
            bus,
            recorder,
            test_settings(),
        );

        Self {
            controller,
            service,
            output,
            events,
            recordings,
        }
    }

    /// Store `entries` as the prompt set and wait for the dispatch
    pub async fn set_prompts(&self, entries: &[(&str, f64)]) -> DispatchOutcome {
        self.controller
            .set_weighted_prompts(prompt_set(entries))
            .await
            .expect("dispatch completed")
    }

    /// Store one active prompt, then play until the session is open
    pub async fn start(&self) {
        self.set_prompts(&[("Funk at 60 bpm", 1.0)]).await;
        self.controller.play().await;
    }

    /// Deliver audio chunks (durations in ms) and let the controller consume them
    pub async fn deliver(&self, durations_ms: &[u64]) {
        self.service.send_audio(durations_ms);
        settle().await;
    }

    /// Start times (seconds) of everything scheduled on the output
    pub fn scheduled_starts(&self) -> Vec<f64> {
        self.output
            .scheduled()
            .iter()
            .map(|v| v.start_time)
            .collect()
    }
}

/// Let spawned tasks (event pumps, dispatches) run without moving the clock
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// Equal within one output frame plus clock rounding
pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 2.5e-3,
        "expected {expected}, got {actual}"
    );
}
