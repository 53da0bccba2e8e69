//! Indexing status snapshots
//!
//! Progress of a running rebuild/resync is published as a JSON snapshot that
//! external pollers read. Writes go through a same-directory temp file plus
//! rename, so a reader never observes a half-written state. No snapshot file
//! means the indexer is idle.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{LibraryError, Result};
use crate::utils::dates::now_timestamp;

/// Phase of a running index operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPhase {
    Rebuilding,
    Resyncing,
}

impl IndexPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexPhase::Rebuilding => "rebuilding",
            IndexPhase::Resyncing => "resyncing",
        }
    }
}

/// One published status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingStatus {
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub total: u64,
    pub current: u64,
    pub progress: f64,
}

/// Writes and clears the `indexing_status.json` snapshot
#[derive(Debug, Clone)]
pub struct StatusPublisher {
    path: PathBuf,
}

impl StatusPublisher {
    pub fn new(data_root: &Path) -> Self {
        Self {
            path: data_root.join("indexing_status.json"),
        }
    }

    /// Publish a snapshot for the running phase.
    ///
    /// `started_at` carries over from an existing snapshot so it survives
    /// progress updates within one phase; it resets once the previous
    /// snapshot has been cleared.
    pub fn publish(&self, phase: IndexPhase, total: u64, current: u64) -> Result<()> {
        let progress = if total == 0 {
            0.0
        } else {
            (current as f64 / total as f64).clamp(0.0, 1.0)
        };

        let started_at = self
            .read()
            .map(|existing| existing.started_at)
            .unwrap_or_else(now_timestamp);

        let status = IndexingStatus {
            status: phase.as_str().to_string(),
            started_at,
            updated_at: now_timestamp(),
            total,
            current,
            progress,
        };

        self.write_atomic(&status)
    }

    /// Temp file in the target's own directory, fsync, then rename over the
    /// target. A cross-volume temp location fails loudly instead of falling
    /// back to a non-atomic write.
    fn write_atomic(&self, status: &IndexingStatus) -> Result<()> {
        let parent = self.path.parent().ok_or_else(|| {
            LibraryError::Fatal(format!("status file has no parent: {}", self.path.display()))
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        serde_json::to_writer(&mut tmp, status)
            .map_err(|e| LibraryError::Fatal(format!("failed to serialize status: {e}")))?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        Ok(())
    }

    /// Remove the snapshot (the idle state)
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the current snapshot; missing or unparseable files read as idle
    pub fn read(&self) -> Option<IndexingStatus> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&content).ok()
    }
}
