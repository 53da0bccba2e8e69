//! ffmpeg discovery via ffmpeg-sidecar
//!
//! the encoder binary is resolved through ffmpeg-sidecar so transcoding
//! works without a system ffmpeg installation

use anyhow::{Context, Result};

pub use ffmpeg_sidecar::download::auto_download;

/// ensures ffmpeg is available, downloading if necessary
pub fn ensure_ffmpeg() -> Result<()> {
    if !ffmpeg_sidecar::command::ffmpeg_is_installed() {
        tracing::info!("ffmpeg not found, downloading...");
        auto_download().context("failed to download ffmpeg")?;
        tracing::info!("ffmpeg downloaded successfully");
    }
    Ok(())
}

/// checks if ffmpeg is available (either system or sidecar)
pub fn is_ffmpeg_available() -> bool {
    ffmpeg_sidecar::command::ffmpeg_is_installed()
}

/// gets the path to the ffmpeg binary
pub fn ffmpeg_path() -> std::path::PathBuf {
    ffmpeg_sidecar::paths::ffmpeg_path()
}
