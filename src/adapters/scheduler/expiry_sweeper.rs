//! ExpirySweeperService - runs the expiry sweep on a schedule.
//!
//! The schedule is either a fixed interval or a daily UTC wall-clock time.
//! Each tick goes through the sweep handler's single-flight guard, so a tick
//! that lands while an admin-triggered sweep is running is skipped.
//!
//! The loop stops when the shutdown channel flips to `true`; a sweep already
//! in progress is allowed to finish first.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::application::handlers::subscription::{SweepExpiredHandler, SweepOutcome};
use crate::config::SweepSchedule;
use crate::ports::Clock;

pub struct ExpirySweeperService {
    handler: Arc<SweepExpiredHandler>,
    schedule: SweepSchedule,
    clock: Arc<dyn Clock>,
}

impl ExpirySweeperService {
    pub fn new(
        handler: Arc<SweepExpiredHandler>,
        schedule: SweepSchedule,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            handler,
            schedule,
            clock,
        }
    }

    /// Time until the next scheduled sweep.
    pub fn next_delay(&self) -> Duration {
        match self.schedule {
            SweepSchedule::Every(interval) => interval,
            SweepSchedule::DailyAt(time) => {
                let now = self.clock.now();
                now.next_daily_at(time)
                    .duration_since(&now)
                    .to_std()
                    .unwrap_or(Duration::ZERO)
            }
        }
    }

    /// Run until `shutdown` becomes `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(schedule = ?self.schedule, "expiry sweeper started");

        loop {
            let delay = self.next_delay();
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(delay) => {
                    self.tick().await;
                }
            }
        }

        tracing::info!("expiry sweeper stopped");
    }

    /// One scheduled sweep.
    pub async fn tick(&self) {
        match self.handler.handle().await {
            Ok(SweepOutcome::Completed(report)) => {
                if report.examined > 0 {
                    tracing::info!(
                        examined = report.examined,
                        removed = report.removed,
                        failed = report.failed,
                        "scheduled sweep finished"
                    );
                }
            }
            Ok(SweepOutcome::Skipped) => {
                tracing::debug!("scheduled sweep skipped, another sweep is running");
            }
            Err(e) => {
                tracing::error!(error = %e, "scheduled sweep failed");
            }
        }
    }
}
