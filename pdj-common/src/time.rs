//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for use in artifact filenames
///
/// Produces `YYYY-MM-DD_HH-MM-SS` (UTC, second precision). The result only
/// contains characters that are valid in filenames on every platform.
pub fn filename_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Build an artifact filename of the form `prefix-YYYY-MM-DD_HH-MM-SS.ext`
pub fn artifact_filename(prefix: &str, at: DateTime<Utc>, extension: &str) -> String {
    format!("{}-{}.{}", prefix, filename_stamp(at), extension)
}
