//! Content-addressed transcode cache
//!
//! Lossless sources are transcoded to mp3 derivatives for
//! bandwidth-constrained playback. A derivative's identity is a stable
//! digest of the canonical source path plus the quality level, so
//! independent writers for different sources never collide. A derivative is
//! fresh while its mtime is at least the source's; stale ones are
//! regenerated on demand.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, SystemTime};
use tokio::process::Command;

use crate::core::ffmpeg;
use crate::error::{LibraryError, Result};
use crate::utils::hashing::path_digest;

/// Source formats worth transcoding (bandwidth-heavy lossless)
const TRANSCODE_SOURCE_EXTS: &[&str] = &["flac", "wav", "aiff", "ape", "alac"];

/// Target quality for a derivative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    High,
    Medium,
    Low,
    /// No transcode; the source file is served as-is
    Original,
}

impl Quality {
    /// Parse a quality name; unknown names are invalid input
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "high" => Ok(Quality::High),
            "medium" => Ok(Quality::Medium),
            "low" => Ok(Quality::Low),
            "original" => Ok(Quality::Original),
            other => Err(LibraryError::InvalidInput(format!(
                "unknown quality: {other}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::High => "high",
            Quality::Medium => "medium",
            Quality::Low => "low",
            Quality::Original => "original",
        }
    }

    /// Target bitrate; `None` for original passthrough
    pub fn bitrate(&self) -> Option<&'static str> {
        match self {
            Quality::High => Some("256k"),
            Quality::Medium => Some("192k"),
            Quality::Low => Some("128k"),
            Quality::Original => None,
        }
    }
}

/// Derivative store over a flat cache directory
#[derive(Debug, Clone)]
pub struct TranscodeCache {
    cache_dir: PathBuf,
    timeout: Duration,
}

impl TranscodeCache {
    /// Create the cache, creating its directory when missing
    pub fn new(cache_dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let cache_dir = cache_dir.into();
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir, timeout })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Check if a source format is transcode-eligible
    pub fn should_transcode(source: &Path) -> bool {
        source
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| TRANSCODE_SOURCE_EXTS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Canonical path string used for cache identity.
    ///
    /// Falls back to an absolute-but-unresolved path when the file cannot
    /// be resolved (it may not exist yet).
    pub fn canonical_key(source: &Path) -> String {
        source
            .canonicalize()
            .unwrap_or_else(|_| {
                if source.is_absolute() {
                    source.to_path_buf()
                } else {
                    std::env::current_dir()
                        .map(|cwd| cwd.join(source))
                        .unwrap_or_else(|_| source.to_path_buf())
                }
            })
            .to_string_lossy()
            .into_owned()
    }

    /// Derivative location for `(source, quality)`; `original` short-circuits
    /// to the source itself
    pub fn cache_path(&self, source: &Path, quality: Quality) -> PathBuf {
        let Some(bitrate) = quality.bitrate() else {
            return source.to_path_buf();
        };

        let digest = path_digest(&Self::canonical_key(source));
        self.cache_dir
            .join(format!("{digest}_{}_{bitrate}.mp3", quality.as_str()))
    }

    /// Check whether a fresh derivative exists.
    ///
    /// Pass-through cases (original quality, non-eligible sources) always
    /// count as cached.
    pub fn is_cached(&self, source: &Path, quality: Quality) -> bool {
        if quality == Quality::Original || !Self::should_transcode(source) {
            return true;
        }

        let cache_path = self.cache_path(source, quality);
        let Ok(cache_meta) = std::fs::metadata(&cache_path) else {
            return false;
        };

        if let Ok(source_meta) = std::fs::metadata(source) {
            let cache_mtime = cache_meta.modified().ok();
            let source_mtime = source_meta.modified().ok();
            if let (Some(cache_mtime), Some(source_mtime)) = (cache_mtime, source_mtime) {
                if cache_mtime < source_mtime {
                    tracing::debug!("cache outdated: {}", cache_path.display());
                    return false;
                }
            }
        }

        true
    }

    /// Return the fresh derivative when one exists, otherwise the source.
    /// Never generates anything; use [`transcode_file`](Self::transcode_file)
    /// for that.
    pub fn cached_or_original(&self, source: &Path, quality: Quality) -> PathBuf {
        if quality == Quality::Original || !Self::should_transcode(source) {
            return source.to_path_buf();
        }

        if self.is_cached(source, quality) {
            self.cache_path(source, quality)
        } else {
            source.to_path_buf()
        }
    }

    /// Produce the derivative for `(source, quality)`, invoking the encoder
    /// when no fresh copy exists.
    ///
    /// Nonzero exit or timeout kills the encoder, removes any partial
    /// output and surfaces the encoder's stderr.
    pub async fn transcode_file(
        &self,
        source: &Path,
        quality: Quality,
        overwrite: bool,
    ) -> Result<PathBuf> {
        let Some(bitrate) = quality.bitrate() else {
            return Ok(source.to_path_buf());
        };
        if !Self::should_transcode(source) {
            return Ok(source.to_path_buf());
        }

        if !source.exists() {
            return Err(LibraryError::NotFound(source.display().to_string()));
        }

        let output_path = self.cache_path(source, quality);
        if !overwrite && self.is_cached(source, quality) {
            tracing::debug!("using existing cache: {}", output_path.display());
            return Ok(output_path);
        }

        tracing::info!(
            "transcoding {} to {} quality ({})",
            source.display(),
            quality.as_str(),
            bitrate
        );

        let mut cmd = Command::new(ffmpeg::ffmpeg_path());
        cmd.arg("-y")
            .arg("-i")
            .arg(source)
            .args(["-vn", "-ar", "44100", "-ac", "2"])
            .args(["-b:a", bitrate])
            .args(["-map_metadata", "0", "-id3v2_version", "3"])
            .arg(&output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn()?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => Ok(output_path),
            Ok(Ok(output)) => {
                remove_partial(&output_path);
                Err(LibraryError::TranscodeFailed {
                    path: source.to_path_buf(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                })
            }
            Ok(Err(e)) => {
                remove_partial(&output_path);
                Err(e.into())
            }
            Err(_) => {
                // dropping the timed-out future kills the child
                remove_partial(&output_path);
                Err(LibraryError::TranscodeFailed {
                    path: source.to_path_buf(),
                    stderr: format!("encoder timed out after {:?}", self.timeout),
                })
            }
        }
    }

    /// Total size of all derivatives, in bytes
    pub fn cache_size(&self) -> u64 {
        let Ok(entries) = std::fs::read_dir(&self.cache_dir) else {
            return 0;
        };

        entries
            .flatten()
            .filter_map(|entry| entry.metadata().ok())
            .filter(|meta| meta.is_file())
            .map(|meta| meta.len())
            .sum()
    }

    /// Delete derivatives, optionally only those older than `older_than_days`.
    ///
    /// Returns the number of files deleted.
    pub fn clear_cache(&self, older_than_days: Option<u64>) -> Result<usize> {
        let now = SystemTime::now();
        let mut deleted = 0;

        for entry in std::fs::read_dir(&self.cache_dir)?.flatten() {
            let path = entry.path();
            let is_derivative = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("mp3"))
                .unwrap_or(false);
            if !is_derivative || !path.is_file() {
                continue;
            }

            let should_delete = match older_than_days {
                None => true,
                Some(days) => entry
                    .metadata()
                    .ok()
                    .and_then(|meta| meta.modified().ok())
                    .and_then(|mtime| now.duration_since(mtime).ok())
                    .map(|age| age.as_secs() > days * 86_400)
                    .unwrap_or(false),
            };

            if should_delete {
                match std::fs::remove_file(&path) {
                    Ok(()) => deleted += 1,
                    Err(e) => tracing::error!("failed to delete {}: {}", path.display(), e),
                }
            }
        }

        tracing::info!("cache cleanup: deleted {} files", deleted);
        Ok(deleted)
    }
}

fn remove_partial(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!("failed to remove partial output {}: {}", path.display(), e);
        }
    }
}
