//! Cron-driven polling.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::error::ServerError;
use crate::guard::BuildGuard;
use crate::orchestrator::Orchestrator;

/// Every 30 minutes.
pub const DEFAULT_SCHEDULE: &str = "*/30 * * * *";

/// Parse a cron expression.
///
/// Accepts the classic five-field form (minute precision) as well as the
/// six- and seven-field forms with seconds and years.
pub fn parse_schedule(expression: &str) -> Result<Schedule, ServerError> {
    let trimmed = expression.trim();
    let normalized = if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    };

    Schedule::from_str(&normalized).map_err(|e| ServerError::Schedule {
        expression: expression.to_string(),
        message: e.to_string(),
    })
}

/// Runs unforced orchestration on every tick of a cron schedule.
pub struct Scheduler {
    schedule: Schedule,
    orchestrator: Arc<Orchestrator>,
    guard: BuildGuard,
}

impl Scheduler {
    pub fn new(schedule: Schedule, orchestrator: Arc<Orchestrator>, guard: BuildGuard) -> Self {
        Self {
            schedule,
            orchestrator,
            guard,
        }
    }

    /// Next tick after `after`.
    pub fn next_after(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(after).next()
    }

    /// Run forever, or until the schedule has no further ticks.
    pub async fn run(self) {
        loop {
            let now = Utc::now();
            let Some(next) = self.next_after(&now) else {
                tracing::warn!("Schedule has no upcoming ticks, stopping scheduler");
                return;
            };
            tracing::debug!("Next scheduled check at {}", next);

            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;

            self.tick().await;
        }
    }

    /// One scheduled check. Skipped when a run is already active.
    ///
    /// Returns whether a run took place.
    pub async fn tick(&self) -> bool {
        let Some(_permit) = self.guard.try_acquire() else {
            tracing::info!("Build in progress, skipping scheduled check");
            return false;
        };

        tracing::info!("Scheduled check started");
        match self.orchestrator.run(false, None).await {
            Ok(report) => tracing::info!(
                "Scheduled check finished ({} built, {} up to date)",
                report.built.len(),
                report.skipped.len()
            ),
            Err(e) => tracing::error!("Scheduled check failed: {}", e),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    use crate::orchestrator::tests::Fixture;

    #[test]
    fn five_field_expressions_get_seconds() {
        let schedule = parse_schedule(DEFAULT_SCHEDULE).unwrap();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 7, 30).unwrap();

        let next = schedule.after(&start).next().unwrap();

        assert_eq!((next.hour(), next.minute(), next.second()), (10, 30, 0));
    }

    #[test]
    fn six_field_expressions_pass_through() {
        let schedule = parse_schedule("15 0 * * * *").unwrap();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 7, 30).unwrap();

        let next = schedule.after(&start).next().unwrap();

        assert_eq!((next.hour(), next.minute(), next.second()), (11, 0, 15));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            parse_schedule("every now and then"),
            Err(ServerError::Schedule { .. })
        ));
    }

    #[tokio::test]
    async fn tick_skips_while_building() {
        let fixture = Fixture::new(&["a"]);
        let guard = BuildGuard::new();
        let scheduler = Scheduler::new(
            parse_schedule(DEFAULT_SCHEDULE).unwrap(),
            Arc::new(fixture.orchestrator(&["a"])),
            guard.clone(),
        );

        let permit = guard.try_acquire().unwrap();
        assert!(!scheduler.tick().await);
        assert!(fixture.built().is_empty());

        drop(permit);
        assert!(scheduler.tick().await);
        assert_eq!(fixture.built(), ["a"]);
        assert!(!guard.is_building());
    }

    #[tokio::test]
    async fn tick_is_unforced() {
        let fixture = Fixture::new(&["a"]);
        let scheduler = Scheduler::new(
            parse_schedule(DEFAULT_SCHEDULE).unwrap(),
            Arc::new(fixture.orchestrator(&["a"])),
            BuildGuard::new(),
        );

        scheduler.tick().await;
        fixture.built();
        scheduler.tick().await;

        assert!(fixture.built().is_empty());
    }
}
