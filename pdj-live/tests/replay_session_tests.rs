//! End-to-end playback of a recorded session log
//!
//! Real decoder, real replay service, headless output, paused time.

mod helpers;

use helpers::{assert_close, EventRecorder, CHANNELS, SAMPLE_RATE};
use pdj_common::events::{ErrorKind, EventBus, LiveEvent, PlaybackState};
use pdj_live::audio::decode::encode_pcm16;
use pdj_live::audio::{HeadlessOutput, Pcm16Decoder};
use pdj_live::recording::{CaptureFormat, DirectorySink, Recorder};
use pdj_live::session::controller::CONNECTION_LOST;
use pdj_live::session::replay::parse_session_log;
use pdj_live::session::SessionCommand;
use pdj_live::{LiveMusicController, ReplayService};
use std::sync::Arc;
use tempfile::TempDir;

/// Setup, then `count` audio messages of `ms` each, spaced `ms` apart
fn session_log(count: usize, ms: u64) -> String {
    let frames = (SAMPLE_RATE as u64 * ms / 1000) as usize;
    let data = encode_pcm16(&vec![0.25; frames * CHANNELS as usize]);
    let mut log = String::from("{\"setupComplete\":{}}\n");
    for _ in 0..count {
        log.push_str(&format!(
            "{{\"delayMs\":{},\"serverContent\":{{\"audioChunks\":[{{\"data\":\"{}\",\"mimeType\":\"audio/l16\"}}]}}}}\n",
            ms, data
        ));
    }
    log
}

#[tokio::test(start_paused = true)]
async fn test_replayed_session_plays_gaplessly_until_closed() {
    let entries = parse_session_log(&session_log(4, 200)).unwrap();
    let service = Arc::new(ReplayService::new(entries, 1.0, false));
    let output = Arc::new(HeadlessOutput::new(SAMPLE_RATE, CHANNELS));
    let dir = TempDir::new().unwrap();
    let bus = Arc::new(EventBus::new(256));
    let mut events = EventRecorder::new(bus.subscribe());

    let controller = LiveMusicController::new(
        service.clone(),
        output.clone(),
        Arc::new(Pcm16Decoder::new(SAMPLE_RATE, CHANNELS)),
        bus,
        Recorder::new(CaptureFormat::Wav, "replay", Arc::new(DirectorySink::new(dir.path()))),
        helpers::test_settings(),
    );
    let _ = controller.set_weighted_prompts(helpers::prompt_set(&[("Neo Soul at 60 bpm", 1.0)]));
    controller.play().await;
    let session = service.sessions()[0].clone();

    // The log ends with a close, which surfaces as a lost connection
    events
        .wait_for(|e| matches!(e, LiveEvent::Error { kind: ErrorKind::Connection, .. }))
        .await;

    assert_eq!(
        events.states(),
        vec![
            PlaybackState::Loading,
            PlaybackState::Playing,
            PlaybackState::Stopped,
        ]
    );
    assert!(events
        .errors()
        .contains(&(ErrorKind::Connection, CONNECTION_LOST.to_string())));

    let starts: Vec<f64> = output.scheduled().iter().map(|v| v.start_time).collect();
    assert_eq!(starts.len(), 4);
    for pair in starts.windows(2) {
        assert_close(pair[1] - pair[0], 0.2);
    }

    let commands = session.commands();
    assert!(matches!(commands[0], SessionCommand::SetWeightedPrompts(_)));
    assert_eq!(commands[1], SessionCommand::Play);
    assert_eq!(commands.last(), Some(&SessionCommand::Stop));

    // The controller let go of the closed session
    drop(session);
    assert_eq!(service.opened_count(), 1);
    assert!(service.sessions().is_empty());
}
