//! Error types for niveflow-sync.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// All errors that can arise while synchronizing a source.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A local source points at a path that does not exist.
    #[error("source '{name}': local path does not exist: {path}")]
    MissingPath { name: String, path: PathBuf },

    /// A git command exited unsuccessfully.
    #[error("git {operation} failed for '{name}': {message}")]
    Git {
        name: String,
        operation: &'static str,
        message: String,
    },

    /// An external command did not finish in time and was killed.
    #[error("{operation} for '{name}' timed out after {}s", .after.as_secs())]
    Timeout {
        name: String,
        operation: &'static str,
        after: Duration,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Fingerprint marker JSON error.
    #[error("fingerprint marker JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A blocking task panicked or was cancelled.
    #[error("sync task for '{name}' failed: {message}")]
    Task { name: String, message: String },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
