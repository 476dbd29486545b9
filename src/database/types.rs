//! Database row types and their model conversions
//!
//! Enums are stored as ordinals and instants as epoch milliseconds.

use chrono::{DateTime, Utc};

use crate::models::machine::{Machine, MachineStatus, MachineType};
use crate::models::notification::{CompletedNotification, NotificationExtent, PendingNotification};

pub(crate) fn to_millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

pub(crate) fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

fn ordinal(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(-1)
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MachineRow {
    pub room_id: i64,
    pub esuds_id: i64,
    pub number: i64,
    pub machine_type: i64,
    pub status: i64,
    pub time_remaining: i64,
}

impl From<MachineRow> for Machine {
    fn from(row: MachineRow) -> Self {
        Machine::new(
            row.room_id,
            row.esuds_id,
            ordinal(row.number),
            MachineType::from_ordinal(ordinal(row.machine_type)),
        )
        .with_status(
            MachineStatus::from_ordinal(ordinal(row.status)),
            Machine::time_remaining_from_wire(row.time_remaining),
        )
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct NotificationRow {
    pub id: i64,
    pub created_at: i64,
    pub extended: i64,
    pub room_id: i64,
    pub machine_num: i64,
    pub machine_type: i64,
    pub desired_status: i64,
    pub estimated_completion: Option<i64>,
}

impl From<NotificationRow> for PendingNotification {
    fn from(row: NotificationRow) -> Self {
        PendingNotification {
            id: row.id,
            created_at: from_millis(row.created_at),
            extended: NotificationExtent::from_ordinal(ordinal(row.extended)),
            room_id: row.room_id,
            machine_num: ordinal(row.machine_num),
            machine_type: MachineType::from_ordinal(ordinal(row.machine_type)),
            desired_status: MachineStatus::from_ordinal(ordinal(row.desired_status)),
            estimated_completion: row.estimated_completion.map(from_millis),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CompletedRow {
    #[sqlx(flatten)]
    pub notification: NotificationRow,
    pub completed_at: i64,
    pub final_status: i64,
}

impl From<CompletedRow> for CompletedNotification {
    fn from(row: CompletedRow) -> Self {
        CompletedNotification {
            notification: row.notification.into(),
            completed_at: from_millis(row.completed_at),
            final_status: MachineStatus::from_ordinal(ordinal(row.final_status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_row_conversion() {
        let row = MachineRow {
            room_id: 4,
            esuds_id: 77,
            number: 2,
            machine_type: 1,
            status: 2,
            time_remaining: 300,
        };
        let machine = Machine::from(row);
        assert_eq!(
            machine,
            Machine::new(4, 77, 2, MachineType::Dryer).with_status(MachineStatus::InUse, Some(300))
        );
    }

    #[test]
    fn test_bad_stored_values_degrade() {
        let row = MachineRow {
            room_id: 4,
            esuds_id: -1,
            number: i64::MAX,
            machine_type: 12,
            status: -7,
            time_remaining: -1,
        };
        let machine = Machine::from(row);
        assert_eq!(machine.num, -1);
        assert_eq!(machine.machine_type, MachineType::Unknown);
        assert_eq!(machine.status, MachineStatus::Unknown);
        assert!(!machine.has_time_remaining());
    }

    #[test]
    fn test_millis_round_trip() {
        let now = from_millis(1_700_000_000_123);
        assert_eq!(to_millis(now), 1_700_000_000_123);
    }
}
