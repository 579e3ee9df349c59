//! Prompt DJ live session (pdj-live) - Main entry point
//!
//! Loads configuration, builds the audio output and the session controller,
//! and serves the HTTP/SSE control surface until Ctrl+C / SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use pdj_common::events::EventBus;
use pdj_common::prompts::default_prompt_set;
use pdj_live::api::{self, AppContext};
use pdj_live::audio::{AudioOutput, HeadlessOutput, Pcm16Decoder};
use pdj_live::config::{LiveConfig, OutputBackend};
use pdj_live::recording::{DirectorySink, Recorder};
use pdj_live::{LiveMusicController, ReplayService};
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for pdj-live
#[derive(Parser, Debug)]
#[command(name = "pdj-live")]
#[command(about = "Live generative music session with gapless playback")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "PDJ_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "PDJ_PORT")]
    port: Option<u16>,

    /// Generation model
    #[arg(short, long, env = "PDJ_MODEL")]
    model: Option<String>,

    /// Session log (JSON lines) to replay as the generation service
    #[arg(long, env = "PDJ_REPLAY")]
    replay: Option<PathBuf>,

    /// Replay speed multiplier
    #[arg(long, env = "PDJ_REPLAY_SPEED")]
    replay_speed: Option<f64>,

    /// Directory for finished recordings
    #[arg(long, env = "PDJ_RECORDINGS_DIR")]
    recordings_dir: Option<PathBuf>,

    /// Output backend: headless or device
    #[arg(long, env = "PDJ_OUTPUT")]
    output: Option<String>,
}

impl Args {
    /// Apply command-line (and environment) overrides on top of the file config
    fn apply(&self, config: &mut LiveConfig) -> Result<()> {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(replay) = &self.replay {
            config.replay.path = Some(replay.clone());
        }
        if let Some(speed) = self.replay_speed {
            config.replay.speed = speed;
        }
        if let Some(dir) = &self.recordings_dir {
            config.recording.directory = Some(dir.clone());
        }
        if let Some(output) = &self.output {
            config.output.backend = match output.to_ascii_lowercase().as_str() {
                "headless" => OutputBackend::Headless,
                "device" => OutputBackend::Device,
                other => bail!("Unknown output backend '{}' (expected headless or device)", other),
            };
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Configuration first: it carries the default log filter
    let config_path = pdj_common::config::resolve_config_path(args.config.as_deref(), "PDJ_CONFIG");
    let mut config: LiveConfig = pdj_common::config::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;
    args.apply(&mut config)?;
    config.validate().context("Invalid configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting pdj-live v{} on port {}", env!("CARGO_PKG_VERSION"), config.port);
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    let settings = config.session_settings();

    let output = build_output(&config)?;

    let Some(replay_path) = config.replay.path.clone() else {
        bail!("No generation service configured: pass --replay <session.jsonl> or set replay.path");
    };
    let service = Arc::new(
        ReplayService::open(&replay_path, config.replay.speed, config.replay.repeat)
            .with_context(|| format!("Failed to load session log {}", replay_path.display()))?,
    );
    if service.entry_count() == 0 {
        warn!("Session log {} is empty; no audio will be generated", replay_path.display());
    }

    let recordings_dir = config.recordings_dir();
    info!("Recordings directory: {}", recordings_dir.display());
    let recorder = Recorder::new(
        config.recording.format,
        config.recording.prefix.clone(),
        Arc::new(DirectorySink::new(recordings_dir)),
    );

    let events = Arc::new(EventBus::new(256));
    let controller = LiveMusicController::new(
        service,
        output,
        Arc::new(Pcm16Decoder::new(settings.sample_rate, settings.channels)),
        events,
        recorder,
        settings,
    );

    // Initial prompts are stored until the first play()
    let initial = controller.set_weighted_prompts(default_prompt_set());
    tokio::spawn(async move {
        match initial.await {
            Ok(outcome) => debug!("Initial prompt set dispatch: {:?}", outcome),
            Err(_) => debug!("Initial prompt set dispatch cancelled"),
        }
    });

    let ctx = AppContext {
        controller: controller.clone(),
        port: config.port,
    };
    api::run(ctx, shutdown_signal()).await.context("Server error")?;

    controller.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

fn build_output(config: &LiveConfig) -> Result<Arc<dyn AudioOutput>> {
    let sample_rate = config.playback.sample_rate;
    let channels = config.playback.channels;
    match config.output.backend {
        OutputBackend::Headless => {
            let output = Arc::new(HeadlessOutput::new(sample_rate, channels));
            output.spawn_pump(Duration::from_millis(config.output.pump_interval_ms));
            Ok(output)
        }
        OutputBackend::Device => open_device(config),
    }
}

#[cfg(feature = "device")]
fn open_device(config: &LiveConfig) -> Result<Arc<dyn AudioOutput>> {
    match pdj_live::audio::DeviceOutput::list_devices() {
        Ok(devices) => info!("Audio output devices: {:?}", devices),
        Err(e) => warn!("Could not list audio devices: {}", e),
    }
    let output = pdj_live::audio::DeviceOutput::open(
        config.output.device_name.clone(),
        config.playback.sample_rate,
        config.playback.channels,
    )
    .context("Failed to open audio device")?;
    Ok(Arc::new(output))
}

#[cfg(not(feature = "device"))]
fn open_device(_config: &LiveConfig) -> Result<Arc<dyn AudioOutput>> {
    bail!("Device output requires building with the `device` feature")
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
