//! Scheduled monitoring without the webhook server.

use std::sync::Arc;

use anyhow::Result;
use niveflow_server::{parse_schedule, BuildGuard, Scheduler};

use crate::config::Config;

pub async fn run(config: &Config) -> Result<()> {
    config.print_sources();
    let schedule = parse_schedule(&config.server.schedule)?;
    tracing::info!("Schedule: {}", config.server.schedule);

    let orchestrator = Arc::new(config.orchestrator()?);
    let guard = BuildGuard::new();
    let scheduler = Scheduler::new(schedule, orchestrator, guard);

    scheduler.tick().await;
    scheduler.run().await;
    Ok(())
}
