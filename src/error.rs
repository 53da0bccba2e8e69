//! Error types shared across the library core

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the library core.
///
/// Per-item failures during scans and transcodes are absorbed where they
/// occur and reflected in logs/progress counts; these variants cover the
/// errors that reach a caller.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// Requested slug or path does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed query, invalid cover data, unknown quality, etc.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A stored document exists but cannot be parsed.
    #[error("unreadable document {path}: {reason}")]
    ReadCorruption { path: PathBuf, reason: String },

    /// The index store could not be read (mixtape reconciliation keeps
    /// serving cached document values when this happens).
    #[error("index store unavailable: {0}")]
    IndexUnavailable(#[source] sqlx::Error),

    /// The external encoder exited nonzero or timed out.
    #[error("transcode failed for {path}: {stderr}")]
    TranscodeFailed { path: PathBuf, stderr: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Write-path failure that aborts the running operation and leaves the
    /// prior committed state visible.
    #[error("fatal: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
