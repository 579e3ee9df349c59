//! Configuration file discovery and loading
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config file (`<config_dir>/prompt-dj/config.toml`)
//! 4. System config file (`/etc/prompt-dj/config.toml`, Linux only)
//!
//! A missing config file is not an error: callers fall back to built-in
//! defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Application directory name used under the platform config dir
pub const APP_DIR: &str = "prompt-dj";

/// Config file name
pub const CONFIG_FILE: &str = "config.toml";

/// Resolve which config file to load, if any
///
/// An explicitly requested path (CLI or environment) is returned even if it
/// does not exist, so that the subsequent load reports the error instead of
/// silently using defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3/4: platform locations
    default_config_locations().into_iter().find(|p| p.exists())
}

/// Platform config file candidates, most specific first
pub fn default_config_locations() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join(APP_DIR).join(CONFIG_FILE));
    }
    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILE));
    }
    candidates
}

/// Load and deserialize a TOML file
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    let value = toml::from_str(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(value)
}

/// Load a TOML file when one was resolved, otherwise return `T::default()`
pub fn load_or_default<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    match path {
        Some(path) => load_toml(path),
        None => {
            debug!("No config file found, using built-in defaults");
            Ok(T::default())
        }
    }
}

/// Default directory for recording artifacts
///
/// `~/Music/prompt-dj` when the platform exposes an audio dir, otherwise
/// `<data_local_dir>/prompt-dj/recordings`, otherwise `./recordings`.
pub fn default_recordings_dir() -> PathBuf {
    dirs::audio_dir()
        .map(|d| d.join(APP_DIR))
        .or_else(|| dirs::data_local_dir().map(|d| d.join(APP_DIR).join("recordings")))
        .unwrap_or_else(|| PathBuf::from("./recordings"))
}
