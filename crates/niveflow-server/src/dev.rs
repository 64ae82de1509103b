//! Local preview of one source with rebuild on change.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::services::ServeDir;

use niveflow_sync::SourceKind;

use crate::error::{OrchestrateError, ServerError};
use crate::guard::BuildGuard;
use crate::orchestrator::Orchestrator;
use crate::watcher::{FileWatcher, WatchEvent};

#[derive(Debug, Clone)]
pub struct DevServerConfig {
    pub host: String,
    pub port: u16,
    /// Open a browser once listening
    pub open: bool,
    pub debounce: Duration,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7777,
            open: true,
            debounce: Duration::from_millis(200),
        }
    }
}

/// Serves the output of an orchestrator over HTTP and rebuilds its local
/// sources when their markdown or JSON changes.
pub struct DevServer {
    config: DevServerConfig,
    orchestrator: Arc<Orchestrator>,
    guard: BuildGuard,
}

impl DevServer {
    pub fn new(config: DevServerConfig, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            config,
            orchestrator,
            guard: BuildGuard::new(),
        }
    }

    /// Local directories feeding the site.
    pub fn watch_paths(&self) -> Vec<PathBuf> {
        self.orchestrator
            .sources()
            .iter()
            .filter_map(|source| match source.kind() {
                SourceKind::Local { path } => Some(self.orchestrator.synchronizer().local_path(path)),
                SourceKind::Remote { .. } => None,
            })
            .collect()
    }

    /// Directory served at `/`.
    pub fn serve_dir(&self) -> Option<PathBuf> {
        self.orchestrator
            .sources()
            .first()
            .map(|source| self.orchestrator.output_dir(source))
    }

    /// Build (or rebuild, when `force` is false only what changed).
    ///
    /// Returns false when a build was already running.
    pub async fn rebuild(&self, force: bool) -> bool {
        let Some(_permit) = self.guard.try_acquire() else {
            return false;
        };
        if let Err(e) = self.orchestrator.run(force, None).await {
            tracing::error!("Dev build failed: {}", e);
        }
        true
    }

    pub async fn start(self) -> Result<(), ServerError> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|_| {
                ServerError::InvalidAddress(format!("{}:{}", self.config.host, self.config.port))
            })?;

        self.rebuild(true).await;

        let serve_dir = self
            .serve_dir()
            .ok_or(ServerError::Run(OrchestrateError::NoSources))?;

        let watch_paths = self.watch_paths();
        if watch_paths.is_empty() {
            tracing::info!("No local sources to watch; serving the initial build only");
        }
        let (watcher, mut rx) = FileWatcher::new(&watch_paths, self.config.debounce)?;

        let config = self.config.clone();
        let rebuilder = Arc::new(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                log_event(&event);
                // One rebuild covers the whole burst.
                while let Ok(more) = rx.try_recv() {
                    log_event(&more);
                }
                if !rebuilder.rebuild(false).await {
                    tracing::debug!("Build already running, ignoring {}", event.path().display());
                }
            }
            // Keep watcher alive
            drop(watcher);
        });

        let app = Router::new().fallback_service(ServeDir::new(&serve_dir));

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        tracing::info!("Serving {} at http://{}", serve_dir.display(), addr);

        if config.open {
            let _ = open::that(format!("http://{}", addr));
        }

        axum::serve(listener, app).await.map_err(ServerError::Serve)
    }
}

fn log_event(event: &WatchEvent) {
    match event {
        WatchEvent::Changed(path) => tracing::info!("Changed: {}", path.display()),
        WatchEvent::Removed(path) => tracing::info!("Removed: {}", path.display()),
    }
}
