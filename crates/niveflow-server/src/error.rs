//! Error types for niveflow-server.

use std::net::SocketAddr;

/// Errors from the long-running servers.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid listen address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("Invalid cron expression '{expression}': {message}")]
    Schedule { expression: String, message: String },

    #[error("File watch error: {0}")]
    Watch(String),

    #[error(transparent)]
    Run(#[from] OrchestrateError),
}

/// Errors that end an orchestration run.
#[derive(Debug, thiserror::Error)]
pub enum OrchestrateError {
    #[error("no sources configured")]
    NoSources,

    #[error("unknown source '{name}' (available: {})", .available.join(", "))]
    UnknownSource { name: String, available: Vec<String> },

    #[error("forced build failed for: {}", .failed.join(", "))]
    BuildFailed { failed: Vec<String> },
}
