//! Recording artifacts
//!
//! Assembles captured PCM16 fragments into a single WAV file and hands it to
//! an `ArtifactSink`.

use crate::error::{Error, Result};
use async_trait::async_trait;
use hound::{WavSpec, WavWriter};
use std::io::Cursor;
use std::path::PathBuf;
use tracing::info;

/// Destination for finished recordings
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Store `bytes` under `file_name`, returning where it went
    async fn save(&self, file_name: &str, bytes: Vec<u8>) -> Result<PathBuf>;
}

/// Writes artifacts into a directory (created on first save)
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ArtifactSink for DirectorySink {
    async fn save(&self, file_name: &str, bytes: Vec<u8>) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, &bytes).await?;
        info!("Recording saved: {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

/// Concatenate s16le fragments into one 16-bit WAV file
pub fn assemble_wav(fragments: &[Vec<u8>], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).map_err(wav_error)?;
        for fragment in fragments {
            for pair in fragment.chunks_exact(2) {
                writer
                    .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                    .map_err(wav_error)?;
            }
        }
        writer.finalize().map_err(wav_error)?;
    }
    Ok(cursor.into_inner())
}

fn wav_error(e: hound::Error) -> Error {
    Error::Recording(format!("WAV encoding failed: {}", e))
}
