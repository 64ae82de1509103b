//! Pull sources into their staging directories.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::detector::{ChangeDetector, ChangeRecord};
use crate::error::SyncError;
use crate::fsutil::{copy_tree, incoming_path, is_ignored_name, replace_dir};
use crate::source::{resolve_local_path, SourceDescriptor, SourceKind};
use crate::vcs::VcsClient;

/// Result of syncing one source as part of a batch.
#[derive(Debug)]
pub struct SyncOutcome {
    pub name: String,

    /// Whether the source has new content; always false when `error` is set
    pub changed: bool,

    pub record: Option<ChangeRecord>,

    pub error: Option<SyncError>,
}

impl SyncOutcome {
    fn from_result(name: String, result: Result<ChangeRecord, SyncError>) -> Self {
        match result {
            Ok(record) => Self {
                name,
                changed: record.changed,
                record: Some(record),
                error: None,
            },
            Err(error) => Self {
                name,
                changed: false,
                record: None,
                error: Some(error),
            },
        }
    }
}

/// Synchronizes sources into `<staging_root>/<name>`.
#[derive(Clone)]
pub struct Synchronizer {
    staging_root: PathBuf,
    detector: ChangeDetector,
    vcs: Arc<dyn VcsClient>,
    cwd: PathBuf,
    home: Option<PathBuf>,
}

impl Synchronizer {
    pub fn new(
        staging_root: impl Into<PathBuf>,
        detector: ChangeDetector,
        vcs: Arc<dyn VcsClient>,
    ) -> Self {
        Self {
            staging_root: staging_root.into(),
            detector,
            vcs,
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            home: dirs::home_dir(),
        }
    }

    /// Base directory for relative local sources.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// Directory `~` expands to.
    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// Staging directory of the source called `name`.
    pub fn staging_dir(&self, name: &str) -> PathBuf {
        self.staging_root.join(name)
    }

    /// Absolute path of a local source.
    pub fn local_path(&self, location: &str) -> PathBuf {
        resolve_local_path(location, &self.cwd, self.home.as_deref())
    }

    /// Sync one source and report whether it changed.
    pub async fn sync(&self, source: &SourceDescriptor) -> Result<ChangeRecord, SyncError> {
        match source.kind() {
            SourceKind::Local { path } => self.sync_local(&source.name, path).await,
            SourceKind::Remote { url, branch } => self.sync_remote(&source.name, url, branch).await,
        }
    }

    /// Sync every source concurrently. One failure never affects the others.
    pub async fn sync_all(&self, sources: &[SourceDescriptor]) -> Vec<SyncOutcome> {
        let handles: Vec<_> = sources
            .iter()
            .cloned()
            .map(|source| {
                let this = self.clone();
                tokio::spawn(async move { this.sync(&source).await })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (source, handle) in sources.iter().zip(handles) {
            let result = handle.await.unwrap_or_else(|e| {
                Err(SyncError::Task {
                    name: source.name.clone(),
                    message: e.to_string(),
                })
            });

            match &result {
                Ok(record) if record.changed => {
                    tracing::info!("[{}] changed ({:?})", source.name, record.evidence)
                }
                Ok(_) => tracing::info!("[{}] no changes", source.name),
                Err(e) => tracing::error!("[{}] sync failed, skipping: {}", source.name, e),
            }

            outcomes.push(SyncOutcome::from_result(source.name.clone(), result));
        }

        outcomes
    }

    async fn sync_remote(
        &self,
        name: &str,
        url: &str,
        branch: &str,
    ) -> Result<ChangeRecord, SyncError> {
        let dest = self.staging_dir(name);

        if dest.join(".git").exists() {
            let incoming = self.vcs.pull(name, &dest, branch).await?;
            return Ok(ChangeRecord::from_remote(false, incoming));
        }

        tracing::info!("[{}] cloning {} ({})", name, url, branch);

        let incoming = incoming_path(&dest);
        if incoming.exists() {
            tokio::fs::remove_dir_all(&incoming)
                .await
                .map_err(|e| crate::error::io_err(&incoming, e))?;
        }
        tokio::fs::create_dir_all(&self.staging_root)
            .await
            .map_err(|e| crate::error::io_err(&self.staging_root, e))?;

        if let Err(e) = self.vcs.clone_repo(name, url, branch, &incoming).await {
            let _ = tokio::fs::remove_dir_all(&incoming).await;
            return Err(e);
        }

        if dest.exists() {
            tokio::fs::remove_dir_all(&dest)
                .await
                .map_err(|e| crate::error::io_err(&dest, e))?;
        }
        tokio::fs::rename(&incoming, &dest)
            .await
            .map_err(|e| crate::error::io_err(&dest, e))?;

        Ok(ChangeRecord::from_remote(true, 0))
    }

    async fn sync_local(&self, name: &str, location: &str) -> Result<ChangeRecord, SyncError> {
        let path = self.local_path(location);
        let dest = self.staging_dir(name);
        let detector = self.detector.clone();
        let owned_name = name.to_string();

        tokio::task::spawn_blocking(move || stage_local(&owned_name, &path, &dest, &detector))
            .await
            .map_err(|e| SyncError::Task {
                name: name.to_string(),
                message: e.to_string(),
            })?
    }
}

fn stage_local(
    name: &str,
    path: &Path,
    dest: &Path,
    detector: &ChangeDetector,
) -> Result<ChangeRecord, SyncError> {
    let mut record = detector.inspect(name, path)?;

    if !record.changed {
        if dest.exists() {
            if let Err(e) = detector.commit(name, &record) {
                tracing::warn!("[{}] could not refresh fingerprint marker: {}", name, e);
            }
            return Ok(record);
        }
        // Staging was removed behind our back; restage and rebuild.
        record.changed = true;
    }

    let copied = replace_dir(dest, |scratch| copy_tree(path, scratch, is_ignored_name))?;
    detector.commit(name, &record)?;

    tracing::info!("[{}] staged {} files from {}", name, copied, path.display());
    Ok(record)
}
