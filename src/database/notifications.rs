//! Pending and completed notification storage

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::query;

use super::connection::DatabaseManager;
use super::types::{from_millis, to_millis, CompletedRow, NotificationRow};
use crate::models::machine::Machine;
use crate::models::notification::{CompletedNotification, NewNotification, PendingNotification};

const NOTIFICATION_COLUMNS: &str =
    "id, created_at, extended, room_id, machine_num, machine_type, desired_status, estimated_completion";

impl DatabaseManager {
    /// Store a new pending notification and return it with its id
    pub async fn insert_notification(
        &self,
        request: NewNotification,
        created_at: DateTime<Utc>,
    ) -> Result<PendingNotification> {
        let result = query(
            r#"
            INSERT INTO pending_notifications
                (created_at, extended, room_id, machine_num, machine_type, desired_status)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(to_millis(created_at))
        .bind(request.extended.ordinal())
        .bind(request.room_id)
        .bind(request.machine_num)
        .bind(request.machine_type.ordinal())
        .bind(request.desired_status.ordinal())
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create notification: {}", e))?;

        // stored instants have millisecond precision
        Ok(request.into_pending(result.last_insert_rowid(), from_millis(to_millis(created_at))))
    }

    /// All pending notifications, oldest first
    pub async fn list_notifications(&self) -> Result<Vec<PendingNotification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM pending_notifications ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PendingNotification::from).collect())
    }

    pub async fn get_notification(&self, id: i64) -> Result<Option<PendingNotification>> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM pending_notifications WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(PendingNotification::from))
    }

    /// Returns whether a notification was removed
    pub async fn delete_notification(&self, id: i64) -> Result<bool> {
        let result = query("DELETE FROM pending_notifications WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Rooms with at least one pending notification
    pub async fn pending_room_ids(&self) -> Result<Vec<i64>> {
        Ok(
            sqlx::query_scalar("SELECT DISTINCT room_id FROM pending_notifications ORDER BY room_id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    pub async fn notifications_for_room(&self, room_id: i64) -> Result<Vec<PendingNotification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM pending_notifications WHERE room_id = ? ORDER BY id"
        ))
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PendingNotification::from).collect())
    }

    pub async fn set_estimated_completion(&self, id: i64, estimate: Option<DateTime<Utc>>) -> Result<()> {
        query("UPDATE pending_notifications SET estimated_completion = ? WHERE id = ?")
            .bind(estimate.map(to_millis))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Earliest estimated completion over all pending notifications
    pub async fn next_estimated_completion(&self) -> Result<Option<DateTime<Utc>>> {
        let millis: Option<i64> =
            sqlx::query_scalar("SELECT MIN(estimated_completion) FROM pending_notifications")
                .fetch_one(&self.pool)
                .await?;
        Ok(millis.map(from_millis))
    }

    /// Move a fulfilled notification into the completed history
    pub async fn complete_notification(
        &self,
        notification: &PendingNotification,
        machine: &Machine,
        completed_at: DateTime<Utc>,
    ) -> Result<CompletedNotification> {
        let mut tx = self.pool.begin().await?;

        query(
            r#"
            INSERT OR REPLACE INTO completed_notifications
                (id, created_at, extended, room_id, machine_num, machine_type, desired_status,
                 estimated_completion, completed_at, final_status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(notification.id)
        .bind(to_millis(notification.created_at))
        .bind(notification.extended.ordinal())
        .bind(notification.room_id)
        .bind(notification.machine_num)
        .bind(notification.machine_type.ordinal())
        .bind(notification.desired_status.ordinal())
        .bind(notification.estimated_completion.map(to_millis))
        .bind(to_millis(completed_at))
        .bind(machine.status.ordinal())
        .execute(&mut *tx)
        .await?;

        query("DELETE FROM pending_notifications WHERE id = ?")
            .bind(notification.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(CompletedNotification {
            notification: notification.clone(),
            completed_at: from_millis(to_millis(completed_at)),
            final_status: machine.status,
        })
    }

    /// Completed history, most recent first
    pub async fn completed_notifications(&self) -> Result<Vec<CompletedNotification>> {
        let rows = sqlx::query_as::<_, CompletedRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS}, completed_at, final_status
             FROM completed_notifications ORDER BY completed_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CompletedNotification::from).collect())
    }

    /// Returns the number of history entries removed
    pub async fn clear_completed(&self) -> Result<u64> {
        let result = query("DELETE FROM completed_notifications")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::machine::{MachineStatus, MachineType};
    use crate::models::notification::NotificationExtent;

    fn request(room_id: i64, machine_num: i32) -> NewNotification {
        NewNotification {
            room_id,
            machine_num,
            machine_type: MachineType::Washer,
            desired_status: MachineStatus::CycleComplete,
            extended: NotificationExtent::Extended,
        }
    }

    #[tokio::test]
    async fn test_insert_get_delete() {
        let db = DatabaseManager::in_memory().await.unwrap();
        let created = db.insert_notification(request(3, 1), Utc::now()).await.unwrap();
        assert!(created.id > 0);

        let fetched = db.get_notification(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.extended, NotificationExtent::Extended);

        assert!(db.delete_notification(created.id).await.unwrap());
        assert!(!db.delete_notification(created.id).await.unwrap());
        assert!(db.get_notification(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rooms_and_estimates() {
        let db = DatabaseManager::in_memory().await.unwrap();
        let a = db.insert_notification(request(3, 1), Utc::now()).await.unwrap();
        let b = db.insert_notification(request(1, 2), Utc::now()).await.unwrap();
        db.insert_notification(request(3, 4), Utc::now()).await.unwrap();

        assert_eq!(db.pending_room_ids().await.unwrap(), vec![1, 3]);
        assert_eq!(db.notifications_for_room(3).await.unwrap().len(), 2);
        assert!(db.next_estimated_completion().await.unwrap().is_none());

        let soon = from_millis(1_700_000_000_000);
        let later = from_millis(1_700_000_600_000);
        db.set_estimated_completion(a.id, Some(later)).await.unwrap();
        db.set_estimated_completion(b.id, Some(soon)).await.unwrap();
        assert_eq!(db.next_estimated_completion().await.unwrap(), Some(soon));

        db.set_estimated_completion(b.id, None).await.unwrap();
        assert_eq!(db.next_estimated_completion().await.unwrap(), Some(later));
    }

    #[tokio::test]
    async fn test_complete_moves_to_history() {
        let db = DatabaseManager::in_memory().await.unwrap();
        let pending = db.insert_notification(request(3, 1), Utc::now()).await.unwrap();
        let machine = Machine::new(3, 7, 1, MachineType::Washer).with_status(MachineStatus::Available, None);

        let completed = db.complete_notification(&pending, &machine, Utc::now()).await.unwrap();
        assert_eq!(completed.final_status, MachineStatus::Available);
        assert!(db.list_notifications().await.unwrap().is_empty());

        let history = db.completed_notifications().await.unwrap();
        assert_eq!(history, vec![completed]);

        assert_eq!(db.clear_completed().await.unwrap(), 1);
        assert!(db.completed_notifications().await.unwrap().is_empty());
    }
}
