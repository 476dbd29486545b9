//! Notification Service
//!
//! Pending notification bookkeeping, the periodic check that fires them and
//! the delivery channels.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::database::DatabaseManager;
use crate::error::AppResult;
use crate::form::encode_form;
use crate::logging::log_notification_delivery;
use crate::models::machine::MachineStatus;
use crate::models::notification::{
    estimated_completion, CompletedNotification, NewNotification, NotificationError, PendingNotification,
};
use crate::models::room::Room;
use crate::services::room_refresher::{RoomOutcome, RoomRefresher};
use crate::services::time_provider::TimeProvider;

/// Delivery errors
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook answered {0}")]
    Status(u16),
}

/// Channel for "machines ready" notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, ready: &[CompletedNotification]) -> Result<(), DeliveryError>;
}

/// Title shown for a batch of ready machines
pub fn ready_title(count: usize) -> String {
    if count == 1 {
        "Machine ready".to_string()
    } else {
        format!("{count} machines ready")
    }
}

/// One line per ready machine
pub fn ready_summary(ready: &[CompletedNotification]) -> String {
    ready
        .iter()
        .map(|c| {
            let n = &c.notification;
            format!("{} {} in room {} is {}", n.machine_type, n.machine_num, n.room_id, c.final_status)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Writes ready notifications to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, ready: &[CompletedNotification]) -> Result<(), DeliveryError> {
        info!(
            count = ready.len(),
            machines = %ready_summary(ready),
            "{}",
            ready_title(ready.len())
        );
        Ok(())
    }
}

/// POSTs ready notifications as a form to a webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Form body sent to the webhook
    pub fn body(ready: &[CompletedNotification]) -> String {
        encode_form([
            ("title", ready_title(ready.len())),
            ("count", ready.len().to_string()),
            ("machines", ready_summary(ready)),
        ])
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn notify(&self, ready: &[CompletedNotification]) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Self::body(ready))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DeliveryError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Result of one pass over the pending notifications
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub checked_at: DateTime<Utc>,
    /// Notifications that fired in this pass
    pub completed: Vec<CompletedNotification>,
    /// Notifications still waiting
    pub pending: usize,
    /// Rooms that could not be refreshed
    pub failed_rooms: Vec<RoomOutcome>,
    /// Earliest estimated completion among the waiting notifications
    pub next_check: Option<DateTime<Utc>>,
    pub delivered: bool,
}

/// Pending notification operations
#[derive(Clone)]
pub struct NotificationService {
    db: DatabaseManager,
    refresher: RoomRefresher,
    notifier: Arc<dyn Notifier>,
    time_provider: Arc<dyn TimeProvider>,
    wake: Arc<Notify>,
}

impl NotificationService {
    pub fn new(
        db: DatabaseManager,
        refresher: RoomRefresher,
        notifier: Arc<dyn Notifier>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            db,
            refresher,
            notifier,
            time_provider,
            wake: Arc::new(Notify::new()),
        }
    }

    /// Signalled whenever a notification is added
    pub fn wake_signal(&self) -> Arc<Notify> {
        self.wake.clone()
    }

    pub async fn create(&self, request: NewNotification) -> AppResult<PendingNotification> {
        request.validate()?;
        let created = self
            .db
            .insert_notification(request, self.time_provider.now_utc())
            .await?;
        info!(
            id = created.id,
            room_id = created.room_id,
            machine_num = created.machine_num,
            desired_status = %created.desired_status,
            "Notification created"
        );
        self.wake.notify_one();
        Ok(created)
    }

    pub async fn list(&self) -> AppResult<Vec<PendingNotification>> {
        Ok(self.db.list_notifications().await?)
    }

    pub async fn get(&self, id: i64) -> AppResult<PendingNotification> {
        self.db
            .get_notification(id)
            .await?
            .ok_or_else(|| NotificationError::NotFound(id).into())
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        if self.db.delete_notification(id).await? {
            info!(id, "Notification deleted");
            Ok(())
        } else {
            Err(NotificationError::NotFound(id).into())
        }
    }

    pub async fn completed(&self) -> AppResult<Vec<CompletedNotification>> {
        Ok(self.db.completed_notifications().await?)
    }

    /// Returns the number of history entries removed
    pub async fn clear_completed(&self) -> AppResult<u64> {
        Ok(self.db.clear_completed().await?)
    }

    /// Refresh every room with pending notifications, fire the fulfilled ones
    /// and re-estimate the rest
    pub async fn check_pending(&self) -> AppResult<CheckOutcome> {
        let room_ids = self.db.pending_room_ids().await?;
        let mut completed = Vec::new();
        let mut failed_rooms = Vec::new();

        for room_id in room_ids {
            match self.refresher.refresh_room(room_id).await {
                Ok(room) => completed.extend(self.check_room(&room).await?),
                Err(e) => {
                    warn!(room_id, error = %e, "Skipping notifications for room");
                    failed_rooms.push(RoomOutcome::Failed {
                        room_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        let delivered = if completed.is_empty() {
            false
        } else {
            match self.notifier.notify(&completed).await {
                Ok(()) => {
                    log_notification_delivery(completed.len(), self.notifier.name(), true);
                    true
                }
                Err(e) => {
                    warn!(error = %e, "Ready notification was not delivered");
                    log_notification_delivery(completed.len(), self.notifier.name(), false);
                    false
                }
            }
        };

        let outcome = CheckOutcome {
            checked_at: self.time_provider.now_utc(),
            completed,
            pending: self.db.list_notifications().await?.len(),
            failed_rooms,
            next_check: self.db.next_estimated_completion().await?,
            delivered,
        };
        debug!(
            completed = outcome.completed.len(),
            pending = outcome.pending,
            next_check = ?outcome.next_check,
            "Notification check finished"
        );
        Ok(outcome)
    }

    async fn check_room(&self, room: &Room) -> AppResult<Vec<CompletedNotification>> {
        let now = self.time_provider.now_utc();
        let mut completed = Vec::new();

        for notification in self.db.notifications_for_room(room.id).await? {
            match notification.find_machine(room.get(notification.machine_type)) {
                Some(machine) if notification.fulfilled_by(machine) => {
                    completed.push(self.db.complete_notification(&notification, machine, now).await?);
                }
                Some(machine) => {
                    let estimate = estimated_completion(now, machine.status, machine.time_remaining());
                    self.db.set_estimated_completion(notification.id, Some(estimate)).await?;
                }
                None => {
                    debug!(
                        id = notification.id,
                        room_id = room.id,
                        machine_num = notification.machine_num,
                        "Watched machine missing from room"
                    );
                    let estimate = estimated_completion(now, MachineStatus::Unknown, None);
                    self.db.set_estimated_completion(notification.id, Some(estimate)).await?;
                }
            }
        }
        Ok(completed)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::io::simulated::FixedMachineGetter;
    use crate::models::machine::{Machine, MachineType};
    use crate::models::notification::{NotificationExtent, MAX_ESTIMATE_SECS};
    use crate::services::time_provider::MockTimeProvider;
    use chrono::Duration;
    use std::sync::Mutex;

    /// Records every delivered batch
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub batches: Mutex<Vec<Vec<CompletedNotification>>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn notify(&self, ready: &[CompletedNotification]) -> Result<(), DeliveryError> {
            self.batches.lock().unwrap().push(ready.to_vec());
            Ok(())
        }
    }

    struct Fixture {
        service: NotificationService,
        getter: Arc<FixedMachineGetter>,
        notifier: Arc<RecordingNotifier>,
        clock: MockTimeProvider,
    }

    async fn fixture() -> Fixture {
        let db = DatabaseManager::in_memory().await.unwrap();
        let getter = Arc::new(FixedMachineGetter::new());
        let clock = MockTimeProvider::new_from_ymd_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let time: Arc<dyn TimeProvider> = Arc::new(clock.clone());
        let refresher = RoomRefresher::new(db.clone(), getter.clone(), time.clone(), 1);
        let notifier = Arc::new(RecordingNotifier::default());
        let service = NotificationService::new(db, refresher, notifier.clone(), time);
        Fixture {
            service,
            getter,
            notifier,
            clock,
        }
    }

    fn request(room_id: i64, machine_num: i32) -> NewNotification {
        NewNotification {
            room_id,
            machine_num,
            machine_type: MachineType::Washer,
            desired_status: MachineStatus::CycleComplete,
            extended: NotificationExtent::Normal,
        }
    }

    fn washer(room_id: i64, num: i32, status: MachineStatus, time_remaining: Option<u64>) -> Machine {
        Machine::new(room_id, 100 + i64::from(num), num, MachineType::Washer).with_status(status, time_remaining)
    }

    #[tokio::test]
    async fn test_crud() {
        let f = fixture().await;
        let created = f.service.create(request(1, 2)).await.unwrap();
        assert_eq!(f.service.get(created.id).await.unwrap(), created);
        assert_eq!(f.service.list().await.unwrap(), vec![created.clone()]);

        f.service.delete(created.id).await.unwrap();
        assert!(matches!(
            f.service.get(created.id).await,
            Err(AppError::Notification(NotificationError::NotFound(_)))
        ));
        assert!(f.service.delete(created.id).await.is_err());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_requests() {
        let f = fixture().await;
        let mut bad = request(1, 2);
        bad.desired_status = MachineStatus::Unavailable;
        assert!(matches!(
            f.service.create(bad).await,
            Err(AppError::Notification(NotificationError::InvalidDesiredStatus(_)))
        ));
        assert!(f.service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_fires_fulfilled_and_estimates_rest() {
        let f = fixture().await;
        f.getter.set_room(
            1,
            vec![
                washer(1, 1, MachineStatus::CycleComplete, None),
                washer(1, 2, MachineStatus::InUse, Some(1_000)),
            ],
        );
        let ready = f.service.create(request(1, 1)).await.unwrap();
        let waiting = f.service.create(request(1, 2)).await.unwrap();

        let outcome = f.service.check_pending().await.unwrap();
        assert_eq!(outcome.completed.len(), 1);
        assert_eq!(outcome.completed[0].notification.id, ready.id);
        assert_eq!(outcome.pending, 1);
        assert!(outcome.delivered);

        let expected = f.clock.now_utc() + Duration::seconds(600);
        assert_eq!(outcome.next_check, Some(expected));
        let stored = f.service.get(waiting.id).await.unwrap();
        assert_eq!(stored.estimated_completion, Some(expected));

        let batches = f.notifier.batches.lock().unwrap().clone();
        assert_eq!(batches.len(), 1);
        assert_eq!(f.service.completed().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_check_without_ready_machines_does_not_notify() {
        let f = fixture().await;
        f.getter.set_room(1, vec![washer(1, 1, MachineStatus::InUse, None)]);
        f.service.create(request(1, 1)).await.unwrap();
        f.service.create(request(1, 9)).await.unwrap();

        let outcome = f.service.check_pending().await.unwrap();
        assert!(outcome.completed.is_empty());
        assert!(!outcome.delivered);
        assert_eq!(outcome.pending, 2);
        // in use without time: five minutes
        assert_eq!(outcome.next_check, Some(f.clock.now_utc() + Duration::minutes(5)));
        assert!(f.notifier.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_survives_huge_time_remaining() {
        let f = fixture().await;
        f.getter.set_room(
            1,
            vec![
                washer(1, 1, MachineStatus::InUse, Some(1_000_000_000_000_000)),
                washer(1, 2, MachineStatus::InUse, Some(u64::MAX)),
            ],
        );
        f.service.create(request(1, 1)).await.unwrap();
        f.service.create(request(1, 2)).await.unwrap();

        let outcome = f.service.check_pending().await.unwrap();
        assert_eq!(outcome.pending, 2);
        assert_eq!(
            outcome.next_check,
            Some(f.clock.now_utc() + Duration::seconds(MAX_ESTIMATE_SECS))
        );
    }

    #[tokio::test]
    async fn test_check_reports_failed_rooms() {
        let f = fixture().await;
        f.getter.fail_room(7, 502);
        f.service.create(request(7, 1)).await.unwrap();

        let outcome = f.service.check_pending().await.unwrap();
        assert_eq!(outcome.failed_rooms.len(), 1);
        assert_eq!(outcome.failed_rooms[0].room_id(), 7);
        assert_eq!(outcome.pending, 1);
        assert!(outcome.next_check.is_none());
    }

    #[tokio::test]
    async fn test_clear_completed() {
        let f = fixture().await;
        f.getter.set_room(1, vec![washer(1, 1, MachineStatus::Available, None)]);
        f.service.create(request(1, 1)).await.unwrap();
        f.service.check_pending().await.unwrap();

        assert_eq!(f.service.clear_completed().await.unwrap(), 1);
        assert!(f.service.completed().await.unwrap().is_empty());
    }

    #[test]
    fn test_webhook_body() {
        let pending = request(1434, 3).into_pending(1, Utc::now());
        let ready = vec![CompletedNotification {
            notification: pending,
            completed_at: Utc::now(),
            final_status: MachineStatus::CycleComplete,
        }];
        assert_eq!(
            WebhookNotifier::body(&ready),
            "title=Machine+ready&count=1&machines=Washer+3+in+room+1434+is+Cycle+Complete"
        );
        assert_eq!(ready_title(3), "3 machines ready");
    }
}
