//! Live music session controller
//!
//! Owns the connection to the generation service, the transport state, the
//! schedule clock, the output gain stage and the recording sidecar. All of it
//! lives in one `ControllerState` behind a tokio mutex, so local commands and
//! service events apply their transitions one at a time.
//!
//! # Transport
//!
//! - `play()`: `→ Loading`, connect (memoized), send the prompts (a set still
//!   pending in the throttle window wins over the stored one), resume output,
//!   `session.play()`, fade gain 0→1.
//! - `pause()`: stop recording, `→ Paused`, fade gain 1→0, clear the schedule
//!   clock, replace the gain stage, `session.pause()`.
//! - `stop()`: as pause, plus prime the new stage with 0→1, discard the session
//!   and its memoized connection, `→ Stopped`, `session.stop()`.
//! - `play_pause()`: Playing → pause, Paused/Stopped → play, Loading → stop.
//!
//! # Service events
//!
//! Events are tagged with the generation of the connection they came from and
//! dropped if that connection has been superseded. Audio is consumed only in
//! Loading/Playing; an error or close forces a full stop.
//!
//! No operation returns an error: failures become `LiveEvent::Error`
//! notifications on the event bus.

use crate::audio::{AudioOutput, GainStage, SegmentDecoder};
use crate::config::SessionSettings;
use crate::error::{Error, Result};
use crate::playback::{Placement, PlaybackScheduler, Throttle, ThrottleAction};
use crate::recording::Recorder;
use crate::session::connection::{ConnectionCache, ConnectionSlot};
use crate::session::service::{AudioChunk, MusicService, MusicSession, ServiceEvent};
use futures::FutureExt;
use pdj_common::events::{ErrorKind, EventBus, LiveEvent, PlaybackState};
use pdj_common::{PromptSet, WeightedPrompt};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Raised when the active prompt subset is empty
pub const NO_ACTIVE_PROMPTS: &str = "There needs to be one active prompt to play.";

/// Raised on service error/close
pub const CONNECTION_LOST: &str = "Connection error, please restart audio.";

/// Raised when recording is requested without playback
pub const RECORDING_NEEDS_PLAYBACK: &str = "Please start playback before recording.";

/// Result of one throttled prompt dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchOutcome {
    /// Sent to the open session
    Sent,
    /// Stored locally; no session yet
    Deferred,
    /// Active subset empty; playback paused
    Rejected,
    /// Session rejected the update; playback paused
    Failed,
}

/// Snapshot of the controller for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub playback_state: PlaybackState,
    pub recording: bool,
    pub connection_established: bool,
    pub session_id: Option<Uuid>,
    pub active_prompts: Vec<WeightedPrompt>,
    pub filtered_prompts: Vec<String>,
    pub prompt_count: usize,
    /// Start time of the next segment on the output clock (seconds)
    pub next_start_time: Option<f64>,
    /// Output clock (seconds)
    pub output_time: f64,
}

struct ControllerState {
    playback: PlaybackState,
    session: Option<Arc<dyn MusicSession>>,
    connection_established: bool,
    prompts: PromptSet,
    filtered: HashSet<String>,
    scheduler: PlaybackScheduler,
    gain: Arc<GainStage>,
    /// Bumped whenever a pending lead timer must not fire
    prime_epoch: u64,
    recorder: Recorder,
}

struct ControllerInner {
    service: Arc<dyn MusicService>,
    output: Arc<dyn AudioOutput>,
    decoder: Arc<dyn SegmentDecoder>,
    events: Arc<EventBus>,
    settings: SessionSettings,
    state: Mutex<ControllerState>,
    connection: ConnectionCache,
    /// `None` resends the stored set; `Some` replaces it first
    dispatcher: Throttle<Option<PromptSet>, DispatchOutcome>,
}

/// Session lifecycle manager (cheap to clone)
#[derive(Clone)]
pub struct LiveMusicController {
    inner: Arc<ControllerInner>,
}

impl LiveMusicController {
    pub fn new(
        service: Arc<dyn MusicService>,
        output: Arc<dyn AudioOutput>,
        decoder: Arc<dyn SegmentDecoder>,
        events: Arc<EventBus>,
        recorder: Recorder,
        settings: SessionSettings,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<ControllerInner>| {
            let weak = weak.clone();
            let action: ThrottleAction<Option<PromptSet>, DispatchOutcome> = Arc::new(move |prompts| {
                let weak = weak.clone();
                async move {
                    match weak.upgrade() {
                        Some(inner) => inner.dispatch_prompts(prompts).await,
                        None => DispatchOutcome::Failed,
                    }
                }
                .boxed()
            });

            ControllerInner {
                state: Mutex::new(ControllerState {
                    playback: PlaybackState::Stopped,
                    session: None,
                    connection_established: false,
                    prompts: PromptSet::new(),
                    filtered: HashSet::new(),
                    scheduler: PlaybackScheduler::new(settings.buffer_time),
                    gain: Arc::new(GainStage::new()),
                    prime_epoch: 0,
                    recorder,
                }),
                dispatcher: Throttle::new(settings.throttle, action),
                connection: ConnectionCache::new(),
                service,
                output,
                decoder,
                events,
                settings,
            }
        });
        Self { inner }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.inner.events.subscribe()
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.inner.events
    }

    pub fn output(&self) -> &Arc<dyn AudioOutput> {
        &self.inner.output
    }

    pub async fn playback_state(&self) -> PlaybackState {
        self.inner.state.lock().await.playback
    }

    pub async fn is_recording(&self) -> bool {
        self.inner.state.lock().await.recorder.is_active()
    }

    pub async fn prompts(&self) -> PromptSet {
        self.inner.state.lock().await.prompts.clone()
    }

    pub async fn status(&self) -> ControllerStatus {
        let state = self.inner.state.lock().await;
        let mut filtered: Vec<String> = state.filtered.iter().cloned().collect();
        filtered.sort();
        ControllerStatus {
            playback_state: state.playback,
            recording: state.recorder.is_active(),
            connection_established: state.connection_established,
            session_id: self
                .inner
                .connection
                .current()
                .filter(|slot| slot.session().is_some())
                .map(|slot| slot.session_id),
            active_prompts: state.prompts.weighted(&state.filtered),
            filtered_prompts: filtered,
            prompt_count: state.prompts.len(),
            next_start_time: state.scheduler.next_start_time(),
            output_time: self.inner.output.current_time(),
        }
    }

    /// Start (or resume) playback
    pub async fn play(&self) {
        self.inner.play().await;
    }

    pub async fn pause(&self) {
        self.inner.pause().await;
    }

    pub async fn stop(&self) {
        self.inner.stop().await;
    }

    /// Single toggle entry point
    pub async fn play_pause(&self) {
        let current = self.playback_state().await;
        match current {
            PlaybackState::Playing => self.pause().await,
            PlaybackState::Paused | PlaybackState::Stopped => self.play().await,
            PlaybackState::Loading => self.stop().await,
        }
    }

    /// Replace the prompt set (rate limited)
    ///
    /// The receiver resolves once the dispatch that used this set (or a later
    /// one in the same window) has run.
    pub fn set_weighted_prompts(&self, prompts: PromptSet) -> oneshot::Receiver<DispatchOutcome> {
        self.inner.dispatcher.trigger(Some(prompts))
    }

    pub async fn toggle_recording(&self) {
        let mut state = self.inner.state.lock().await;
        if state.recorder.is_active() {
            self.inner.stop_recording(&mut state);
        } else {
            self.inner.start_recording(&mut state);
        }
    }

    /// Drop pending prompt updates and stop everything
    pub async fn shutdown(&self) {
        info!("Live controller shutting down");
        self.inner.dispatcher.cancel();
        self.inner.stop().await;
    }
}

impl ControllerInner {
    fn set_state(&self, state: &mut ControllerState, new_state: PlaybackState) {
        let old_state = state.playback;
        state.playback = new_state;
        if old_state != new_state {
            info!("Playback state: {} -> {}", old_state, new_state);
        }
        self.events.emit_lossy(LiveEvent::PlaybackStateChanged {
            old_state,
            new_state,
            timestamp: chrono::Utc::now(),
        });
    }

    fn emit_error(&self, kind: ErrorKind, message: impl Into<String>) {
        let message = message.into();
        warn!("{} error: {}", kind, message);
        self.events.emit_lossy(LiveEvent::error(kind, message));
    }

    fn fade_secs(&self) -> f64 {
        self.settings.fade.as_secs_f64()
    }

    async fn play(self: &Arc<Self>) {
        let slot = {
            let mut state = self.state.lock().await;
            if state.playback == PlaybackState::Playing {
                debug!("play() while already playing");
                return;
            }
            self.set_state(&mut state, PlaybackState::Loading);
            self.connection.slot()
        };

        let session = match self.session_for(&slot).await {
            Ok(session) => session,
            Err(e) => {
                if !self.connection.is_current(slot.generation) {
                    debug!("Connect for superseded connection {} ended: {}", slot.generation, e);
                    return;
                }
                error!("Failed to connect to generation service: {}", e);
                self.stop().await;
                self.emit_error(ErrorKind::Connection, e.to_string());
                return;
            }
        };

        let attached = {
            let mut state = self.state.lock().await;
            if self.connection.is_current(slot.generation) {
                state.session = Some(Arc::clone(&session));
                true
            } else {
                false
            }
        };
        if !attached {
            debug!("Stopped while connecting; closing orphaned session");
            if let Err(e) = session.stop().await {
                debug!("Orphaned session stop failed: {}", e);
            }
            return;
        }

        // A set still waiting in the throttle window is sent as is
        match self.dispatcher.trigger_or_keep_pending(None).await {
            Ok(DispatchOutcome::Sent) | Ok(DispatchOutcome::Deferred) => {}
            Ok(outcome) => {
                debug!("Prompt dispatch {:?}; not starting playback", outcome);
                return;
            }
            Err(_) => {
                debug!("Prompt dispatch cancelled; not starting playback");
                return;
            }
        }

        {
            let state = self.state.lock().await;
            if !state.playback.accepts_audio() || !self.connection.is_current(slot.generation) {
                debug!("Transport changed to {} during play(); aborting", state.playback);
                return;
            }
        }

        self.output.resume();
        if let Err(e) = session.play().await {
            self.emit_error(ErrorKind::Transport, e.to_string());
            self.pause().await;
            return;
        }

        let state = self.state.lock().await;
        let now = self.output.current_time();
        state.gain.fade(0.0, 1.0, now, self.fade_secs());
        info!("Playback requested (connection {})", slot.generation);
    }

    /// Session for `slot`, connecting if needed (one connect per slot)
    async fn session_for(self: &Arc<Self>, slot: &ConnectionSlot) -> Result<Arc<dyn MusicSession>> {
        let generation = slot.generation;
        slot.get_or_connect(|| async move {
            if !self.connection.is_current(generation) {
                return Err(Error::Connection("connection superseded".to_string()));
            }
            info!(
                "Connecting to generation service (model {}, connection {})",
                self.settings.model, generation
            );
            let (tx, rx) = mpsc::unbounded_channel();
            let session = self.service.connect(&self.settings.model, tx).await?;
            self.spawn_event_pump(generation, rx);
            Ok(session)
        })
        .await
    }

    fn spawn_event_pump(self: &Arc<Self>, generation: u64, mut rx: mpsc::UnboundedReceiver<ServiceEvent>) {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.handle_service_event(generation, event).await;
                if !inner.connection.is_current(generation) {
                    break;
                }
            }
            debug!("Event pump for connection {} finished", generation);
        });
    }

    async fn handle_service_event(self: &Arc<Self>, generation: u64, event: ServiceEvent) {
        if !self.connection.is_current(generation) {
            debug!("Ignoring event from superseded connection {}", generation);
            return;
        }

        match event {
            ServiceEvent::SetupComplete => {
                let mut state = self.state.lock().await;
                if self.connection.is_current(generation) {
                    state.connection_established = true;
                    info!("Generation service setup complete (connection {})", generation);
                }
            }
            ServiceEvent::FilteredPrompt { text, reason } => {
                {
                    let mut state = self.state.lock().await;
                    if !self.connection.is_current(generation) {
                        return;
                    }
                    state.filtered.insert(text.clone());
                }
                info!("Prompt filtered by service: '{}' ({})", text, reason);
                self.events.emit_lossy(LiveEvent::FilteredPrompt {
                    text,
                    filtered_reason: reason,
                    timestamp: chrono::Utc::now(),
                });
            }
            ServiceEvent::AudioChunks(chunks) => {
                self.process_audio_chunks(generation, chunks).await;
            }
            ServiceEvent::Error(message) => {
                error!("Generation service error: {}", message);
                self.connection_lost().await;
            }
            ServiceEvent::Closed => {
                warn!("Generation service closed the session");
                self.connection_lost().await;
            }
        }
    }

    async fn connection_lost(self: &Arc<Self>) {
        self.state.lock().await.connection_established = false;
        self.stop().await;
        self.emit_error(ErrorKind::Connection, CONNECTION_LOST);
    }

    async fn process_audio_chunks(self: &Arc<Self>, generation: u64, chunks: Vec<AudioChunk>) {
        let mut state = self.state.lock().await;
        // stop() may have run between the pump's check and this lock
        if !self.connection.is_current(generation) {
            debug!("Discarding audio from superseded connection {}", generation);
            return;
        }
        for chunk in chunks {
            if !state.playback.accepts_audio() {
                debug!("Discarding audio chunk while {}", state.playback);
                return;
            }

            let segment = match self.decoder.decode_segment(&chunk.data) {
                Ok(segment) => segment,
                Err(e) => {
                    warn!("Dropping undecodable audio chunk: {}", e);
                    continue;
                }
            };

            let now = self.output.current_time();
            match state.scheduler.place(now, segment.duration()) {
                Placement::Primed { start } => {
                    self.output.schedule(segment, start, &state.gain);
                    self.arm_lead_timer(&mut state);
                }
                Placement::Scheduled { start } => {
                    self.output.schedule(segment, start, &state.gain);
                }
                Placement::Underrun { .. } => {
                    state.prime_epoch += 1;
                    self.set_state(&mut state, PlaybackState::Loading);
                }
            }
        }
    }

    /// Flip Loading → Playing once the lead buffer has played in
    fn arm_lead_timer(self: &Arc<Self>, state: &mut ControllerState) {
        state.prime_epoch += 1;
        let epoch = state.prime_epoch;
        let lead = self.settings.buffer_time;
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(lead).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut state = inner.state.lock().await;
            if state.prime_epoch == epoch && state.playback == PlaybackState::Loading {
                inner.set_state(&mut state, PlaybackState::Playing);
            } else {
                debug!("Lead timer {} expired without effect ({})", epoch, state.playback);
            }
        });
    }

    /// Throttled action behind `set_weighted_prompts`
    async fn dispatch_prompts(self: Arc<Self>, prompts: Option<PromptSet>) -> DispatchOutcome {
        let (session, weighted) = {
            let mut state = self.state.lock().await;
            if let Some(prompts) = prompts {
                state.prompts = prompts;
            }
            let weighted = state.prompts.weighted(&state.filtered);
            if weighted.is_empty() {
                drop(state);
                self.emit_error(ErrorKind::Configuration, NO_ACTIVE_PROMPTS);
                self.pause().await;
                return DispatchOutcome::Rejected;
            }
            match state.session.clone() {
                Some(session) => (session, weighted),
                None => {
                    debug!("No session yet; {} active prompts stored", weighted.len());
                    return DispatchOutcome::Deferred;
                }
            }
        };

        debug!("Sending {} weighted prompts", weighted.len());
        match session.set_weighted_prompts(weighted).await {
            Ok(()) => DispatchOutcome::Sent,
            Err(e) => {
                self.emit_error(ErrorKind::Transport, e.to_string());
                self.pause().await;
                DispatchOutcome::Failed
            }
        }
    }

    async fn pause(&self) {
        let session = {
            let mut state = self.state.lock().await;
            self.stop_recording(&mut state);
            self.set_state(&mut state, PlaybackState::Paused);
            self.retire_gain_stage(&mut state);
            state.session.clone()
        };

        if let Some(session) = session {
            if let Err(e) = session.pause().await {
                warn!("Session pause failed: {}", e);
            }
        }
    }

    async fn stop(&self) {
        let session = {
            let mut state = self.state.lock().await;
            self.stop_recording(&mut state);
            self.retire_gain_stage(&mut state);
            let now = self.output.current_time();
            state.gain.fade(0.0, 1.0, now, self.fade_secs());

            self.connection.invalidate();
            state.connection_established = false;
            state.filtered.clear();
            let session = state.session.take();
            self.set_state(&mut state, PlaybackState::Stopped);
            session
        };

        if let Some(session) = session {
            if let Err(e) = session.stop().await {
                warn!("Session stop failed: {}", e);
            }
        }
    }

    /// Fade out the current stage, clear the clock and start a fresh stage
    fn retire_gain_stage(&self, state: &mut ControllerState) {
        let now = self.output.current_time();
        state.gain.fade(1.0, 0.0, now, self.fade_secs());
        state.scheduler.reset();
        state.prime_epoch += 1;
        state.gain = Arc::new(GainStage::new());
    }

    fn start_recording(&self, state: &mut ControllerState) {
        if !state.playback.accepts_audio() {
            self.emit_error(ErrorKind::Recording, RECORDING_NEEDS_PLAYBACK);
            return;
        }
        match state.recorder.start(&self.output, &state.gain) {
            Ok(()) => self.events.emit_lossy(LiveEvent::RecordingStateChanged {
                recording: true,
                timestamp: chrono::Utc::now(),
            }),
            Err(e) => self.emit_error(ErrorKind::Recording, e.to_string()),
        }
    }

    fn stop_recording(&self, state: &mut ControllerState) {
        if state.recorder.stop(&self.output, &self.events) {
            self.events.emit_lossy(LiveEvent::RecordingStateChanged {
                recording: false,
                timestamp: chrono::Utc::now(),
            });
        }
    }
}
