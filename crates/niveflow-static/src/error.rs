//! Error types for niveflow-static.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use niveflow_sync::SyncError;

/// Errors that can occur while building one source.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Staging(#[from] SyncError),

    #[error("nothing staged for '{name}' at {path}")]
    MissingStaging { name: String, path: PathBuf },

    #[error("Failed to render template: {0}")]
    Template(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bundler command is empty")]
    EmptyCommand,

    #[error("failed to start bundler '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("bundler '{program}' exited with {status}")]
    BundlerExit { program: String, status: ExitStatus },

    #[error("bundler '{program}' timed out after {}s", .after.as_secs())]
    Timeout { program: String, after: Duration },

    #[error("build task failed: {0}")]
    Task(String),
}

/// Convenience constructor for [`BuildError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> BuildError {
    BuildError::Io {
        path: path.into(),
        source,
    }
}
