//! Session log replay
//!
//! A `MusicService` that plays back a captured session log instead of talking
//! to the remote service. The log is JSON lines, one server message per line,
//! each optionally carrying `"delayMs"`: how long to wait before delivering it.
//!
//! ```text
//! {"setupComplete": {}}
//! {"delayMs": 120, "serverContent": {"audioChunks": [{"data": "..."}]}}
//! ```
//!
//! Delivery starts on the session's first `play()` and is suspended by
//! `pause()`. At the end of the log the session either starts over (`repeat`)
//! or reports a close, like a remote session ending.

use crate::error::{Error, Result};
use crate::session::service::{
    MusicService, MusicSession, ServiceEvent, ServiceEventSink, SessionCommand,
};
use crate::session::wire::ServerMessage;
use async_trait::async_trait;
use pdj_common::WeightedPrompt;
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// One log line
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayEntry {
    #[serde(default, rename = "delayMs")]
    pub delay_ms: u64,

    #[serde(flatten)]
    pub message: ServerMessage,
}

/// Parse a JSON-lines session log (blank lines skipped)
pub fn parse_session_log(content: &str) -> Result<Vec<ReplayEntry>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .map_err(|e| Error::SessionLog(format!("line {}: {}", index + 1, e)))
        })
        .collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Service replaying a session log
pub struct ReplayService {
    entries: Arc<Vec<ReplayEntry>>,
    speed: f64,
    repeat: bool,
    sessions: Mutex<Vec<Weak<ReplaySession>>>,
    opened: AtomicUsize,
}

impl ReplayService {
    pub fn new(entries: Vec<ReplayEntry>, speed: f64, repeat: bool) -> Self {
        Self {
            entries: Arc::new(entries),
            speed: if speed.is_finite() && speed > 0.0 { speed } else { 1.0 },
            repeat,
            sessions: Mutex::new(Vec::new()),
            opened: AtomicUsize::new(0),
        }
    }

    /// Load a session log from disk
    pub fn open(path: &Path, speed: f64, repeat: bool) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let entries = parse_session_log(&content)?;
        info!(
            "Loaded session log {} ({} messages, speed {}x)",
            path.display(),
            entries.len(),
            speed
        );
        Ok(Self::new(entries, speed, repeat))
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Sessions still held by a client, oldest first
    pub fn sessions(&self) -> Vec<Arc<ReplaySession>> {
        lock(&self.sessions).iter().filter_map(Weak::upgrade).collect()
    }

    /// Number of sessions opened since start
    pub fn opened_count(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MusicService for ReplayService {
    async fn connect(&self, model: &str, events: ServiceEventSink) -> Result<Arc<dyn MusicSession>> {
        let (running, _) = watch::channel(false);
        let session = Arc::new(ReplaySession {
            entries: Arc::clone(&self.entries),
            speed: self.speed,
            repeat: self.repeat,
            events,
            running,
            feeder: Mutex::new(None),
            commands: Mutex::new(Vec::new()),
        });
        let mut sessions = lock(&self.sessions);
        sessions.retain(|s| s.strong_count() > 0);
        sessions.push(Arc::downgrade(&session));
        let number = self.opened.fetch_add(1, Ordering::Relaxed) + 1;
        info!("Replay session {} opened for model {}", number, model);
        Ok(session)
    }
}

/// Session fed from the log
pub struct ReplaySession {
    entries: Arc<Vec<ReplayEntry>>,
    speed: f64,
    repeat: bool,
    events: ServiceEventSink,
    running: watch::Sender<bool>,
    feeder: Mutex<Option<JoinHandle<()>>>,
    commands: Mutex<Vec<SessionCommand>>,
}

impl ReplaySession {
    /// Commands received so far, in order
    pub fn commands(&self) -> Vec<SessionCommand> {
        lock(&self.commands).clone()
    }

    fn record(&self, command: SessionCommand) {
        lock(&self.commands).push(command);
    }
}

#[async_trait]
impl MusicSession for ReplaySession {
    async fn set_weighted_prompts(&self, prompts: Vec<WeightedPrompt>) -> Result<()> {
        if prompts.is_empty() {
            return Err(Error::Transport("At least one weighted prompt is required.".to_string()));
        }
        self.record(SessionCommand::SetWeightedPrompts(prompts));
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.record(SessionCommand::Play);
        self.running.send_replace(true);

        let mut feeder = lock(&self.feeder);
        if feeder.is_none() {
            *feeder = Some(tokio::spawn(feed(
                Arc::clone(&self.entries),
                self.speed,
                self.repeat,
                self.events.clone(),
                self.running.subscribe(),
            )));
        }
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record(SessionCommand::Pause);
        self.running.send_replace(false);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.record(SessionCommand::Stop);
        self.running.send_replace(false);
        if let Some(feeder) = lock(&self.feeder).take() {
            feeder.abort();
        }
        Ok(())
    }
}

impl Drop for ReplaySession {
    fn drop(&mut self) {
        if let Some(feeder) = lock(&self.feeder).take() {
            feeder.abort();
        }
    }
}

async fn feed(
    entries: Arc<Vec<ReplayEntry>>,
    speed: f64,
    repeat: bool,
    events: ServiceEventSink,
    mut running: watch::Receiver<bool>,
) {
    if entries.is_empty() {
        return;
    }
    loop {
        for entry in entries.iter() {
            let resumed = running.wait_for(|running| *running).await.is_ok();
            if !resumed {
                return;
            }
            if entry.delay_ms > 0 {
                let delay = Duration::from_secs_f64(entry.delay_ms as f64 / 1000.0 / speed);
                tokio::time::sleep(delay).await;
            }
            for event in entry.message.clone().into_events() {
                if events.send(event).is_err() {
                    debug!("Replay receiver gone, stopping feed");
                    return;
                }
            }
        }
        if !repeat {
            debug!("Session log finished");
            let _ = events.send(ServiceEvent::Closed);
            return;
        }
    }
}
