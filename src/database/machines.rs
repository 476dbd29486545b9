//! Machine readings storage

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::query;
use std::time::Instant;

use super::connection::DatabaseManager;
use super::types::{from_millis, to_millis, MachineRow};
use crate::logging::{elapsed_millis, log_database_operation};
use crate::models::machine::Machine;
use crate::models::room::Room;

impl DatabaseManager {
    /// Replace everything stored for a room with a fresh set of readings
    pub async fn replace_room_machines(
        &self,
        room_id: i64,
        machines: &[Machine],
        loaded_at: DateTime<Utc>,
    ) -> Result<()> {
        let started = Instant::now();
        let loaded_at = to_millis(loaded_at);
        let mut tx = self.pool.begin().await?;

        query(
            r#"
            INSERT INTO rooms (id, loaded_at) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET loaded_at = excluded.loaded_at
            "#,
        )
        .bind(room_id)
        .bind(loaded_at)
        .execute(&mut *tx)
        .await?;

        query("DELETE FROM machines WHERE room_id = ?")
            .bind(room_id)
            .execute(&mut *tx)
            .await?;

        for machine in machines {
            query(
                r#"
                INSERT INTO machines
                    (room_id, number, machine_type, esuds_id, status, time_remaining, last_updated)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(room_id)
            .bind(machine.num)
            .bind(machine.machine_type.ordinal())
            .bind(machine.esuds_id)
            .bind(machine.status.ordinal())
            .bind(machine.time_remaining_wire())
            .bind(loaded_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        log_database_operation(
            "REPLACE",
            "machines",
            elapsed_millis(started),
            u64::try_from(machines.len()).ok(),
        );
        Ok(())
    }

    /// Stored readings of a room, `None` when the room was never loaded
    pub async fn room_machines(&self, room_id: i64) -> Result<Option<Room>> {
        let loaded_at: Option<i64> = sqlx::query_scalar("SELECT loaded_at FROM rooms WHERE id = ?")
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(loaded_at) = loaded_at else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, MachineRow>(
            r#"
            SELECT room_id, esuds_id, number, machine_type, status, time_remaining
            FROM machines
            WHERE room_id = ?
            ORDER BY id
            "#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Room::from_machines(
            room_id,
            from_millis(loaded_at),
            rows.into_iter().map(Machine::from),
        )))
    }
}
