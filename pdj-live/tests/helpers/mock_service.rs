//! Scripted generation service for integration tests
//!
//! `MockService` counts connects, can hold connects behind a gate or fail
//! them, and keeps the event sink of every connection so tests can inject
//! service events (including into superseded connections).

use async_trait::async_trait;
use pdj_common::WeightedPrompt;
use pdj_live::audio::{AudioSegment, SegmentDecoder};
use pdj_live::error::{Error, Result};
use pdj_live::session::{
    AudioChunk, MusicService, MusicSession, ServiceEvent, ServiceEventSink, SessionCommand,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Session recording every command it receives
#[derive(Default)]
pub struct MockSession {
    commands: Mutex<Vec<SessionCommand>>,
    fail_prompts: AtomicBool,
}

impl MockSession {
    pub fn commands(&self) -> Vec<SessionCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// Prompt updates received so far
    pub fn prompt_updates(&self) -> Vec<Vec<WeightedPrompt>> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                SessionCommand::SetWeightedPrompts(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, command: &SessionCommand) -> usize {
        self.commands().iter().filter(|c| *c == command).count()
    }

    pub fn clear(&self) {
        self.commands.lock().unwrap().clear();
    }

    /// Make prompt updates fail with "quota exceeded"
    pub fn fail_prompt_updates(&self, fail: bool) {
        self.fail_prompts.store(fail, Ordering::SeqCst);
    }

    fn record(&self, command: SessionCommand) {
        self.commands.lock().unwrap().push(command);
    }
}

#[async_trait]
impl MusicSession for MockSession {
    async fn set_weighted_prompts(&self, prompts: Vec<WeightedPrompt>) -> Result<()> {
        if self.fail_prompts.load(Ordering::SeqCst) {
            return Err(Error::Transport("quota exceeded".to_string()));
        }
        self.record(SessionCommand::SetWeightedPrompts(prompts));
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.record(SessionCommand::Play);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record(SessionCommand::Pause);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.record(SessionCommand::Stop);
        Ok(())
    }
}

/// Scripted service
pub struct MockService {
    connects: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
    fail_connect: AtomicBool,
    sessions: Mutex<Vec<Arc<MockSession>>>,
    sinks: Mutex<Vec<ServiceEventSink>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            connects: AtomicUsize::new(0),
            gate: None,
            fail_connect: AtomicBool::new(false),
            sessions: Mutex::new(Vec::new()),
            sinks: Mutex::new(Vec::new()),
        }
    }

    /// Connects block until `release_connects()`
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::new()
        }
    }

    pub fn release_connects(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    pub fn fail_connects(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn session(&self, index: usize) -> Arc<MockSession> {
        Arc::clone(&self.sessions.lock().unwrap()[index])
    }

    pub fn last_session(&self) -> Arc<MockSession> {
        Arc::clone(self.sessions.lock().unwrap().last().expect("no session opened"))
    }

    /// Inject an event into connection `index` (0 = first)
    pub fn send_to(&self, index: usize, event: ServiceEvent) {
        // A closed receiver means the controller dropped that connection
        let _ = self.sinks.lock().unwrap()[index].send(event);
    }

    /// Inject an event into the most recent connection
    pub fn send(&self, event: ServiceEvent) {
        let index = self.sinks.lock().unwrap().len() - 1;
        self.send_to(index, event);
    }

    /// Inject audio chunks; each chunk lasts the given number of milliseconds
    pub fn send_audio(&self, durations_ms: &[u64]) {
        self.send(audio_event(durations_ms));
    }
}

#[async_trait]
impl MusicService for MockService {
    async fn connect(&self, _model: &str, events: ServiceEventSink) -> Result<Arc<dyn MusicSession>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| Error::Connection(e.to_string()))?
                .forget();
        }
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::Connection("service unavailable".to_string()));
        }

        let session = Arc::new(MockSession::default());
        self.sessions.lock().unwrap().push(Arc::clone(&session));
        self.sinks.lock().unwrap().push(events);
        Ok(session)
    }
}

/// Audio event whose chunks decode (via `DurationDecoder`) to the given lengths
pub fn audio_event(durations_ms: &[u64]) -> ServiceEvent {
    ServiceEvent::AudioChunks(
        durations_ms
            .iter()
            .map(|ms| AudioChunk {
                data: ms.to_string(),
                mime_type: None,
            })
            .collect(),
    )
}

/// Decoder treating the chunk payload as a duration in milliseconds
///
/// Payloads that are not a number fail to decode.
pub struct DurationDecoder {
    pub sample_rate: u32,
    pub channels: u16,
}

impl SegmentDecoder for DurationDecoder {
    fn decode_segment(&self, data: &str) -> Result<AudioSegment> {
        let ms: u64 = data
            .parse()
            .map_err(|_| Error::Decode(format!("not a duration: {}", data)))?;
        let frames = (ms * self.sample_rate as u64 / 1000) as usize;
        Ok(AudioSegment::new(
            vec![0.5; frames * self.channels as usize],
            self.sample_rate,
            self.channels,
        ))
    }
}
