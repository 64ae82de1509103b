//! One orchestration run.

use anyhow::{bail, Result};

use crate::config::Config;

pub async fn run(config: &Config, force: bool, only: Option<String>) -> Result<()> {
    let orchestrator = config.orchestrator()?;
    let report = orchestrator.run(force, only.as_deref()).await?;

    let sync_failures = report.synced.iter().filter(|o| o.error.is_some()).count();
    if sync_failures > 0 || !report.failed.is_empty() {
        bail!(
            "{} sync failure(s), {} build failure(s)",
            sync_failures,
            report.failed.len()
        );
    }

    tracing::info!(
        "Done: {} built, {} up to date",
        report.built.len(),
        report.skipped.len()
    );
    Ok(())
}
