//! Configuration management for pdj-live
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (`--port`, `--model`, `--replay`, ...)
//! 2. Environment variables (`PDJ_*`, wired through clap)
//! 3. TOML configuration file (see `pdj_common::config`)
//! 4. Built-in defaults (code constants below)
//!
//! Everything here is bootstrap configuration: the process must restart to
//! pick up changes.

use crate::error::{Error, Result};
use crate::recording::CaptureFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default HTTP control port
pub const DEFAULT_PORT: u16 = 5750;

/// Default generation model
pub const DEFAULT_MODEL: &str = "lyria-realtime-exp";

/// Lead buffer absorbing network jitter before playback starts
pub const DEFAULT_BUFFER_TIME_MS: u64 = 2000;

/// Gain ramp length used on play/pause/stop
pub const DEFAULT_FADE_MS: u64 = 100;

/// Prompt update window
pub const DEFAULT_THROTTLE_MS: u64 = 200;

/// Output sample rate the service streams at
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Output channel count the service streams at
pub const DEFAULT_CHANNELS: u16 = 2;

/// Top-level configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// HTTP server port
    pub port: u16,

    /// Generation model requested on connect
    pub model: String,

    pub playback: PlaybackConfig,
    pub prompts: PromptConfig,
    pub recording: RecordingConfig,
    pub replay: ReplayConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Scheduler and output format settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub buffer_time_ms: u64,
    pub fade_ms: u64,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Prompt dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub throttle_ms: u64,
}

/// Recording sidecar settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Where finished recordings are written (platform default if unset)
    pub directory: Option<PathBuf>,
    pub format: CaptureFormat,
    /// Filename prefix: `<prefix>-YYYY-MM-DD_HH-MM-SS.<ext>`
    pub prefix: String,
}

/// Session log replay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// JSON-lines session log to replay as the generation service
    pub path: Option<PathBuf>,
    /// Playback speed multiplier for recorded message delays
    pub speed: f64,
    /// Start over at the end of the log instead of closing the session
    pub repeat: bool,
}

/// Output backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputBackend {
    /// Software clock, audio rendered to a null sink (taps still receive it)
    #[default]
    Headless,
    /// Real audio device (requires the `device` feature)
    Device,
}

/// Audio output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub backend: OutputBackend,
    /// Device name (default device if unset)
    pub device_name: Option<String>,
    /// Render interval of the headless output
    pub pump_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is not set
    pub level: String,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            model: DEFAULT_MODEL.to_string(),
            playback: PlaybackConfig::default(),
            prompts: PromptConfig::default(),
            recording: RecordingConfig::default(),
            replay: ReplayConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            buffer_time_ms: DEFAULT_BUFFER_TIME_MS,
            fade_ms: DEFAULT_FADE_MS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            throttle_ms: DEFAULT_THROTTLE_MS,
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            format: CaptureFormat::Wav,
            prefix: "prompt-dj".to_string(),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            path: None,
            speed: 1.0,
            repeat: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            backend: OutputBackend::Headless,
            device_name: None,
            pump_interval_ms: 20,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "pdj_live=info,pdj_common=info,tower_http=info".to_string(),
        }
    }
}

impl LiveConfig {
    /// Parse from TOML text (missing keys take defaults)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reject values the scheduler cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.playback.buffer_time_ms == 0 {
            return Err(Error::Config("playback.buffer_time_ms must be > 0".to_string()));
        }
        if self.playback.sample_rate == 0 {
            return Err(Error::Config("playback.sample_rate must be > 0".to_string()));
        }
        if self.playback.channels == 0 {
            return Err(Error::Config("playback.channels must be > 0".to_string()));
        }
        if self.prompts.throttle_ms == 0 {
            return Err(Error::Config("prompts.throttle_ms must be > 0".to_string()));
        }
        if !(self.replay.speed.is_finite() && self.replay.speed > 0.0) {
            return Err(Error::Config("replay.speed must be a positive number".to_string()));
        }
        if self.output.pump_interval_ms == 0 {
            return Err(Error::Config("output.pump_interval_ms must be > 0".to_string()));
        }
        Ok(())
    }

    /// Runtime settings for the session controller
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            model: self.model.clone(),
            buffer_time: Duration::from_millis(self.playback.buffer_time_ms),
            fade: Duration::from_millis(self.playback.fade_ms),
            throttle: Duration::from_millis(self.prompts.throttle_ms),
            sample_rate: self.playback.sample_rate,
            channels: self.playback.channels,
        }
    }

    /// Recording directory, falling back to the platform default
    pub fn recordings_dir(&self) -> PathBuf {
        self.recording
            .directory
            .clone()
            .unwrap_or_else(pdj_common::config::default_recordings_dir)
    }
}

/// Settings consumed by `LiveMusicController`
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub model: String,
    pub buffer_time: Duration,
    pub fade: Duration,
    pub throttle: Duration,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for SessionSettings {
    fn default() -> Self {
        LiveConfig::default().session_settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LiveConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.model, "lyria-realtime-exp");
        assert_eq!(config.recording.format, CaptureFormat::Wav);
        assert_eq!(config.output.backend, OutputBackend::Headless);
        assert!(config.validate().is_ok());

        let settings = config.session_settings();
        assert_eq!(settings.buffer_time, Duration::from_secs(2));
        assert_eq!(settings.fade, Duration::from_millis(100));
        assert_eq!(settings.throttle, Duration::from_millis(200));
        assert_eq!(settings.sample_rate, 48_000);
        assert_eq!(settings.channels, 2);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LiveConfig::from_toml_str(
            r#"
            port = 6001

            [playback]
            buffer_time_ms = 3000

            [recording]
            format = "webm"
            prefix = "set"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 6001);
        assert_eq!(config.playback.buffer_time_ms, 3000);
        assert_eq!(config.playback.fade_ms, DEFAULT_FADE_MS);
        assert_eq!(config.recording.format, CaptureFormat::Webm);
        assert_eq!(config.recording.prefix, "set");
        assert_eq!(config.prompts.throttle_ms, DEFAULT_THROTTLE_MS);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = LiveConfig::default();
        config.playback.buffer_time_ms = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = LiveConfig::default();
        config.prompts.throttle_ms = 0;
        assert!(config.validate().is_err());

        let mut config = LiveConfig::default();
        config.replay.speed = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = LiveConfig::from_toml_str("port = \"not a number\"");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_explicit_recordings_dir() {
        let mut config = LiveConfig::default();
        config.recording.directory = Some(PathBuf::from("/tmp/pdj"));
        assert_eq!(config.recordings_dir(), PathBuf::from("/tmp/pdj"));
    }
}
