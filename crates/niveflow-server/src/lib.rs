//! Trigger surface for niveflow.
//!
//! The [`Orchestrator`] runs sync → decide → build over the configured
//! sources. It is driven by the webhook server, the cron [`Scheduler`] and
//! the [`DevServer`], all of which share one [`BuildGuard`] so that at most
//! one run is active at a time.

pub mod dev;
pub mod error;
pub mod guard;
pub mod orchestrator;
pub mod scheduler;
pub mod server;
pub mod watcher;

pub use dev::{DevServer, DevServerConfig};
pub use error::{OrchestrateError, ServerError};
pub use guard::{BuildGuard, BuildPermit};
pub use orchestrator::{Orchestrator, RunReport};
pub use scheduler::{parse_schedule, Scheduler, DEFAULT_SCHEDULE};
pub use server::{router, AppState, WebhookServer, WebhookServerConfig};
pub use watcher::{FileWatcher, WatchEvent};
