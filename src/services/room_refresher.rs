//! Room Refresher
//!
//! Fetches machine readings from the configured source, stores them and
//! serves cached rooms.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{warn, Instrument};

use crate::database::DatabaseManager;
use crate::error::AppResult;
use crate::io::MachineGetter;
use crate::logging::{elapsed_millis, log_room_refresh};
use crate::models::room::Room;
use crate::refresh_span;
use crate::services::time_provider::TimeProvider;

/// Result of refreshing one room
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RoomOutcome {
    Refreshed { room_id: i64, machines: usize },
    Failed { room_id: i64, error: String },
}

impl RoomOutcome {
    pub fn room_id(&self) -> i64 {
        match self {
            RoomOutcome::Refreshed { room_id, .. } | RoomOutcome::Failed { room_id, .. } => *room_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RoomOutcome::Refreshed { .. })
    }
}

/// Per-room results of one refresh request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub refreshed_at: DateTime<Utc>,
    pub rooms: Vec<RoomOutcome>,
}

impl RefreshReport {
    /// True only when every room was refreshed
    pub fn is_success(&self) -> bool {
        self.rooms.iter().all(RoomOutcome::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &RoomOutcome> {
        self.rooms.iter().filter(|outcome| !outcome.is_success())
    }
}

/// Loads rooms from the machine source into the database
#[derive(Clone)]
pub struct RoomRefresher {
    db: DatabaseManager,
    getter: Arc<dyn MachineGetter>,
    time_provider: Arc<dyn TimeProvider>,
    default_room_id: i64,
}

impl RoomRefresher {
    pub fn new(
        db: DatabaseManager,
        getter: Arc<dyn MachineGetter>,
        time_provider: Arc<dyn TimeProvider>,
        default_room_id: i64,
    ) -> Self {
        Self {
            db,
            getter,
            time_provider,
            default_room_id,
        }
    }

    pub fn default_room_id(&self) -> i64 {
        self.default_room_id
    }

    /// Fetch and store every listed room; no rooms means the default room.
    /// Rooms are refreshed one after another and each keeps its own outcome.
    pub async fn refresh(&self, room_ids: &[i64]) -> RefreshReport {
        let mut ids: Vec<i64> = if room_ids.is_empty() {
            vec![self.default_room_id]
        } else {
            room_ids.to_vec()
        };
        let mut seen = std::collections::HashSet::new();
        ids.retain(|id| seen.insert(*id));

        let refreshed_at = self.time_provider.now_utc();
        let mut rooms = Vec::with_capacity(ids.len());
        for room_id in ids {
            let outcome = match self.refresh_room(room_id).await {
                Ok(room) => RoomOutcome::Refreshed {
                    room_id,
                    machines: room.len(),
                },
                Err(e) => RoomOutcome::Failed {
                    room_id,
                    error: e.to_string(),
                },
            };
            rooms.push(outcome);
        }

        RefreshReport { refreshed_at, rooms }
    }

    /// Fetch one room from the source and store it
    pub async fn refresh_room(&self, room_id: i64) -> AppResult<Room> {
        self.fetch_and_store(room_id).instrument(refresh_span!(room_id)).await
    }

    async fn fetch_and_store(&self, room_id: i64) -> AppResult<Room> {
        let started = Instant::now();
        let fetched = self.getter.get_machines(room_id).await;
        let duration_ms = elapsed_millis(started);

        let machines = match fetched {
            Ok(machines) => machines,
            Err(e) => {
                log_room_refresh(room_id, self.getter.name(), None, duration_ms);
                return Err(e.into());
            }
        };
        tracing::Span::current().record("machines", machines.len());
        log_room_refresh(room_id, self.getter.name(), Some(machines.len()), duration_ms);

        let loaded_at = self.time_provider.now_utc();
        self.db.replace_room_machines(room_id, &machines, loaded_at).await?;
        Ok(Room::from_machines(room_id, loaded_at, machines))
    }

    /// Stored room, refetched when missing or older than `max_age`.
    /// A failed refetch falls back to stale readings when there are any.
    pub async fn room(&self, room_id: i64, max_age: Duration) -> AppResult<Room> {
        let stored = self.db.room_machines(room_id).await?;
        let now = self.time_provider.now_utc();

        match stored {
            Some(room) if room.age(now) <= max_age => Ok(room),
            Some(stale) => match self.refresh_room(room_id).await {
                Ok(room) => Ok(room),
                Err(e) => {
                    warn!(room_id, error = %e, "Refresh failed, serving stale readings");
                    Ok(stale)
                }
            },
            None => self.refresh_room(room_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::simulated::FixedMachineGetter;
    use crate::models::machine::{Machine, MachineStatus, MachineType};
    use crate::services::time_provider::MockTimeProvider;

    struct Fixture {
        refresher: RoomRefresher,
        getter: Arc<FixedMachineGetter>,
        clock: MockTimeProvider,
        db: DatabaseManager,
    }

    async fn fixture() -> Fixture {
        let db = DatabaseManager::in_memory().await.unwrap();
        let getter = Arc::new(FixedMachineGetter::new());
        let clock = MockTimeProvider::new_from_ymd_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let refresher = RoomRefresher::new(db.clone(), getter.clone(), Arc::new(clock.clone()), 1434);
        Fixture {
            refresher,
            getter,
            clock,
            db,
        }
    }

    fn washer(room_id: i64, num: i32, status: MachineStatus) -> Machine {
        Machine::new(room_id, 100 + i64::from(num), num, MachineType::Washer).with_status(status, None)
    }

    #[tokio::test]
    async fn test_refresh_persists_rooms() {
        let f = fixture().await;
        f.getter.set_room(1, vec![washer(1, 1, MachineStatus::Available), washer(1, 2, MachineStatus::InUse)]);
        f.getter.set_room(2, vec![]);

        let report = f.refresher.refresh(&[1, 2, 1]).await;
        assert!(report.is_success());
        assert_eq!(
            report.rooms,
            vec![
                RoomOutcome::Refreshed { room_id: 1, machines: 2 },
                RoomOutcome::Refreshed { room_id: 2, machines: 0 },
            ]
        );
        assert_eq!(f.db.room_machines(1).await.unwrap().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_keeps_per_room_failures() {
        let f = fixture().await;
        f.getter.set_room(1, vec![washer(1, 1, MachineStatus::Available)]);
        f.getter.fail_room(2, 503);

        let report = f.refresher.refresh(&[1, 2]).await;
        assert!(!report.is_success());
        assert!(report.rooms[0].is_success());
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].room_id(), 2);
    }

    #[tokio::test]
    async fn test_empty_refresh_uses_default_room() {
        let f = fixture().await;
        f.getter.set_room(1434, vec![washer(1434, 1, MachineStatus::Available)]);
        let report = f.refresher.refresh(&[]).await;
        assert_eq!(report.rooms, vec![RoomOutcome::Refreshed { room_id: 1434, machines: 1 }]);
    }

    #[tokio::test]
    async fn test_room_uses_cache_until_stale() {
        let f = fixture().await;
        f.getter.set_room(1, vec![washer(1, 1, MachineStatus::InUse)]);

        let first = f.refresher.room(1, Duration::seconds(60)).await.unwrap();
        assert_eq!(f.getter.calls(), 1);

        f.getter.set_room(1, vec![washer(1, 1, MachineStatus::Available)]);
        f.clock.advance(Duration::seconds(30));
        let cached = f.refresher.room(1, Duration::seconds(60)).await.unwrap();
        assert_eq!(cached, first);
        assert_eq!(f.getter.calls(), 1);

        f.clock.advance(Duration::seconds(31));
        let fresh = f.refresher.room(1, Duration::seconds(60)).await.unwrap();
        assert_eq!(f.getter.calls(), 2);
        assert_eq!(fresh.washers()[0].status, MachineStatus::Available);
    }

    #[tokio::test]
    async fn test_cached_room_matches_refresh_with_repeated_numbers() {
        let f = fixture().await;
        f.getter.set_room(
            1,
            vec![
                Machine::new(1, 7, -1, MachineType::Unknown),
                Machine::new(1, 8, -1, MachineType::Unknown),
            ],
        );

        let fetched = f.refresher.refresh_room(1).await.unwrap();
        let cached = f.refresher.room(1, Duration::seconds(60)).await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(cached, fetched);
        assert_eq!(f.getter.calls(), 1);
    }

    #[tokio::test]
    async fn test_room_serves_stale_when_source_fails() {
        let f = fixture().await;
        f.getter.set_room(1, vec![washer(1, 1, MachineStatus::InUse)]);
        f.refresher.room(1, Duration::zero()).await.unwrap();

        f.getter.fail_room(1, 500);
        f.clock.advance(Duration::minutes(5));
        let stale = f.refresher.room(1, Duration::seconds(60)).await.unwrap();
        assert_eq!(stale.washers()[0].status, MachineStatus::InUse);

        assert!(f.refresher.room(2, Duration::seconds(60)).await.is_err());
    }
}
