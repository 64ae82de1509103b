//! Webhook server plus scheduled checks.

use std::sync::Arc;

use anyhow::Result;
use niveflow_server::{
    parse_schedule, AppState, BuildGuard, Scheduler, WebhookServer, WebhookServerConfig,
};

use crate::config::Config;

pub async fn run(config: &Config, schedule: bool) -> Result<()> {
    config.print_sources();

    let orchestrator = Arc::new(config.orchestrator()?);
    let guard = BuildGuard::new();

    let scheduler = if schedule {
        tracing::info!("Schedule: {}", config.server.schedule);
        Some(Scheduler::new(
            parse_schedule(&config.server.schedule)?,
            Arc::clone(&orchestrator),
            guard.clone(),
        ))
    } else {
        tracing::info!("Scheduled checks disabled");
        None
    };

    let server = WebhookServer::new(
        WebhookServerConfig {
            host: config.server.host.clone(),
            port: config.server.port,
        },
        AppState {
            orchestrator: Arc::clone(&orchestrator),
            guard: guard.clone(),
        },
    );

    if let Some(scheduler) = scheduler {
        tokio::spawn(async move {
            // Initial check, then follow the schedule.
            scheduler.tick().await;
            scheduler.run().await;
        });
    } else if let Some(_permit) = guard.try_acquire() {
        if let Err(e) = orchestrator.run(false, None).await {
            tracing::error!("Initial check failed: {}", e);
        }
    }

    server.start().await?;
    Ok(())
}
