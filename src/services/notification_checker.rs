//! Notification Checker
//!
//! Background task that runs the pending-notification check whenever the
//! earliest estimated completion comes due.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::services::notification_service::NotificationService;
use crate::services::time_provider::TimeProvider;

/// Schedules `NotificationService::check_pending`
pub struct NotificationChecker {
    service: NotificationService,
    time_provider: Arc<dyn TimeProvider>,
    wake: Arc<Notify>,
    min_interval: Duration,
    max_interval: Duration,
}

impl NotificationChecker {
    pub fn new(
        service: NotificationService,
        time_provider: Arc<dyn TimeProvider>,
        min_interval: Duration,
        max_interval: Duration,
    ) -> Self {
        let wake = service.wake_signal();
        Self {
            service,
            time_provider,
            wake,
            min_interval,
            max_interval: max_interval.max(min_interval),
        }
    }

    /// Wait before the next check; nothing scheduled means the longest wait
    pub fn delay_until(&self, next_check: Option<DateTime<Utc>>) -> Duration {
        let Some(next_check) = next_check else {
            return self.max_interval;
        };
        let wait = (next_check - self.time_provider.now_utc())
            .to_std()
            .unwrap_or(Duration::ZERO);
        wait.clamp(self.min_interval, self.max_interval)
    }

    /// Run one check and work out the following wait
    pub async fn tick(&self) -> Duration {
        match self.service.check_pending().await {
            Ok(outcome) => {
                let delay = self.delay_until(outcome.next_check);
                debug!(
                    completed = outcome.completed.len(),
                    pending = outcome.pending,
                    delay_secs = delay.as_secs(),
                    "Next notification check scheduled"
                );
                delay
            }
            Err(e) => {
                error!(error = %e, "Notification check failed");
                self.min_interval
            }
        }
    }

    /// Check forever, waking early when a notification is added
    pub async fn run(self) {
        info!(
            min_secs = self.min_interval.as_secs(),
            max_secs = self.max_interval.as_secs(),
            "Notification checker started"
        );
        loop {
            let delay = self.tick().await;
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.wake.notified() => debug!("Notification checker woken early"),
            }
        }
    }
}
