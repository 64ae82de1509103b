//! Sync → decide → build over the configured sources.

use std::path::PathBuf;

use niveflow_static::{BuildDispatcher, BuildError, BuildReport};
use niveflow_sync::{SourceDescriptor, SyncOutcome, Synchronizer};

use crate::error::OrchestrateError;

/// What one run did.
#[derive(Debug, Default)]
pub struct RunReport {
    pub synced: Vec<SyncOutcome>,
    pub built: Vec<BuildReport>,
    /// Sources left alone because nothing changed
    pub skipped: Vec<String>,
    pub failed: Vec<(String, BuildError)>,
}

pub struct Orchestrator {
    sources: Vec<SourceDescriptor>,
    synchronizer: Synchronizer,
    dispatcher: BuildDispatcher,
}

impl Orchestrator {
    pub fn new(
        sources: Vec<SourceDescriptor>,
        synchronizer: Synchronizer,
        dispatcher: BuildDispatcher,
    ) -> Self {
        Self {
            sources,
            synchronizer,
            dispatcher,
        }
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.synchronizer
    }

    pub fn output_dir(&self, source: &SourceDescriptor) -> PathBuf {
        self.dispatcher.output_dir(source)
    }

    /// Sync the selected sources concurrently, then rebuild, one at a time,
    /// each source that changed, has no output yet, or is forced.
    ///
    /// Build failures are collected and the remaining sources still run; a
    /// forced run with any failure is an error.
    pub async fn run(&self, force: bool, only: Option<&str>) -> Result<RunReport, OrchestrateError> {
        let selected = self.select(only)?;
        tracing::info!(
            "Syncing {} source(s){}",
            selected.len(),
            if force { " (forced)" } else { "" }
        );

        let synced = self.synchronizer.sync_all(&selected).await;
        let mut report = RunReport::default();

        for (source, outcome) in selected.iter().zip(&synced) {
            let staged = self.synchronizer.staging_dir(&source.name);
            if let Some(error) = &outcome.error {
                if !staged.is_dir() {
                    tracing::warn!(
                        "[{}] Sync failed and nothing is staged, skipping: {}",
                        source.name,
                        error
                    );
                    report.skipped.push(source.name.clone());
                    continue;
                }
            }

            let output_dir = self.dispatcher.output_dir(source);
            let missing_output = !output_dir.exists();

            if !(force || missing_output || outcome.changed) {
                tracing::info!("[{}] Up to date, skipping build", source.name);
                report.skipped.push(source.name.clone());
                continue;
            }

            if missing_output && !outcome.changed && !force {
                tracing::info!("[{}] No output at {}, building", source.name, output_dir.display());
            }

            match self.dispatcher.build(source, &staged).await {
                Ok(built) => report.built.push(built),
                Err(e) => {
                    tracing::error!("[{}] Build failed: {}", source.name, e);
                    report.failed.push((source.name.clone(), e));
                }
            }
        }
        report.synced = synced;

        tracing::info!(
            "Run finished: {} built, {} skipped, {} failed",
            report.built.len(),
            report.skipped.len(),
            report.failed.len()
        );

        if force && !report.failed.is_empty() {
            return Err(OrchestrateError::BuildFailed {
                failed: report.failed.iter().map(|(name, _)| name.clone()).collect(),
            });
        }
        Ok(report)
    }

    fn select(&self, only: Option<&str>) -> Result<Vec<SourceDescriptor>, OrchestrateError> {
        if self.sources.is_empty() {
            return Err(OrchestrateError::NoSources);
        }

        match only {
            None => Ok(self.sources.clone()),
            Some(name) => self
                .sources
                .iter()
                .find(|s| s.name == name)
                .map(|s| vec![s.clone()])
                .ok_or_else(|| OrchestrateError::UnknownSource {
                    name: name.to_string(),
                    available: self.sources.iter().map(|s| s.name.clone()).collect(),
                }),
        }
    }
}
