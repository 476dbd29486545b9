//! Pending Notification Model
//!
//! A request to be told when a specific machine reaches a desired status,
//! and the completion estimate used to schedule the next status check.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

use super::machine::{Machine, MachineStatus, MachineType};

const MINUTE_SECS: i64 = 60;

/// Fallback waits (seconds) when a machine reports no usable time remaining
pub const DEFAULT_WAIT_CYCLE_COMPLETE_SECS: i64 = 5 * MINUTE_SECS;
pub const DEFAULT_WAIT_IN_USE_SECS: i64 = DEFAULT_WAIT_CYCLE_COMPLETE_SECS;
pub const DEFAULT_WAIT_UNAVAILABLE_SECS: i64 = 45 * MINUTE_SECS;
pub const DEFAULT_WAIT_UNKNOWN_SECS: i64 = 30 * MINUTE_SECS;

/// Longest wait ever estimated from a reported time remaining
pub const MAX_ESTIMATE_SECS: i64 = 7 * 24 * 60 * MINUTE_SECS;

/// How long a notification stays armed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationExtent {
    #[default]
    Normal,
    Extended,
    Indefinite,
}

impl NotificationExtent {
    /// Decode a stored ordinal; unknown values fall back to `Normal`
    pub fn from_ordinal(ordinal: i32) -> Self {
        usize::try_from(ordinal)
            .ok()
            .and_then(|index| Self::iter().nth(index))
            .unwrap_or_default()
    }

    pub fn ordinal(self) -> i32 {
        match self {
            NotificationExtent::Normal => 0,
            NotificationExtent::Extended => 1,
            NotificationExtent::Indefinite => 2,
        }
    }
}

/// A stored request for a "machine ready" notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingNotification {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub extended: NotificationExtent,
    pub room_id: i64,
    pub machine_num: i32,
    pub machine_type: MachineType,
    pub desired_status: MachineStatus,
    /// When the machine is expected to reach the desired status
    pub estimated_completion: Option<DateTime<Utc>>,
}

impl PendingNotification {
    /// Whether `machine` is the physical machine this notification watches.
    /// Status is ignored.
    pub fn matched_by(&self, machine: &Machine) -> bool {
        self.room_id == machine.room_id
            && self.machine_num == machine.num
            && self.machine_type == machine.machine_type
    }

    /// Whether `machine` is the watched machine and has reached the desired
    /// status or a better one
    pub fn fulfilled_by(&self, machine: &Machine) -> bool {
        self.matched_by(machine) && machine.status.is_at_least_as_good_as(self.desired_status)
    }

    /// Find the watched machine in a list of readings
    pub fn find_machine<'a>(&self, machines: &'a [Machine]) -> Option<&'a Machine> {
        machines.iter().find(|m| self.matched_by(m))
    }
}

/// A notification that fired, kept as history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedNotification {
    #[serde(flatten)]
    pub notification: PendingNotification,
    pub completed_at: DateTime<Utc>,
    /// Status the machine reported when the notification fired
    pub final_status: MachineStatus,
}

/// Request payload for a new notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub room_id: i64,
    pub machine_num: i32,
    pub machine_type: MachineType,
    #[serde(default = "default_desired_status")]
    pub desired_status: MachineStatus,
    #[serde(default)]
    pub extended: NotificationExtent,
}

fn default_desired_status() -> MachineStatus {
    MachineStatus::CycleComplete
}

impl NewNotification {
    pub fn validate(&self) -> Result<(), NotificationError> {
        if self.machine_num < 0 {
            return Err(NotificationError::InvalidMachineNumber(self.machine_num));
        }
        if matches!(
            self.desired_status,
            MachineStatus::Unavailable | MachineStatus::Unknown
        ) {
            return Err(NotificationError::InvalidDesiredStatus(self.desired_status));
        }
        Ok(())
    }

    pub fn into_pending(self, id: i64, created_at: DateTime<Utc>) -> PendingNotification {
        PendingNotification {
            id,
            created_at,
            extended: self.extended,
            room_id: self.room_id,
            machine_num: self.machine_num,
            machine_type: self.machine_type,
            desired_status: self.desired_status,
            estimated_completion: None,
        }
    }
}

/// Estimated wait until a machine in `status` finishes its cycle.
///
/// A reported time under one second is treated as missing.
/// Estimates are capped at [`MAX_ESTIMATE_SECS`].
pub fn estimate_remaining(status: MachineStatus, time_remaining: Option<u64>) -> Duration {
    match time_remaining {
        Some(secs) if secs >= 1 => {
            let scaled = secs.checked_mul(6).map_or(u64::MAX, |six_tenths| six_tenths / 10);
            let capped = i64::try_from(scaled).map_or(MAX_ESTIMATE_SECS, |s| s.min(MAX_ESTIMATE_SECS));
            Duration::seconds(capped.max(MINUTE_SECS))
        }
        _ => Duration::seconds(match status {
            MachineStatus::CycleComplete => DEFAULT_WAIT_CYCLE_COMPLETE_SECS,
            MachineStatus::InUse => DEFAULT_WAIT_IN_USE_SECS,
            MachineStatus::Unavailable => DEFAULT_WAIT_UNAVAILABLE_SECS,
            MachineStatus::Available | MachineStatus::Unknown => DEFAULT_WAIT_UNKNOWN_SECS,
        }),
    }
}

/// Instant a machine is expected to finish, saturating at the latest
/// representable instant
pub fn estimated_completion(now: DateTime<Utc>, status: MachineStatus, time_remaining: Option<u64>) -> DateTime<Utc> {
    now.checked_add_signed(estimate_remaining(status, time_remaining))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Notification errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("Notification not found: {0}")]
    NotFound(i64),

    #[error("Invalid machine number: {0}")]
    InvalidMachineNumber(i32),

    #[error("Cannot wait for a machine to become {0}")]
    InvalidDesiredStatus(MachineStatus),
}
