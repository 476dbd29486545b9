//! Simulated machine sources for development and tests

use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{FetchError, MachineGetter};
use crate::models::machine::{Machine, MachineStatus, MachineType};

const RANDOM_CAPACITY: i32 = 32;
const DESCENDING_COUNT: i32 = 8 * 3;

/// Random statuses on every call
#[derive(Debug, Default)]
pub struct RandomMachineGetter;

impl RandomMachineGetter {
    pub fn new() -> Self {
        Self
    }

    fn machine(rng: &mut impl Rng, room_id: i64, num: i32, machine_type: MachineType, max_minutes: u64) -> Machine {
        let status = MachineStatus::from_ordinal(rng.gen_range(0..4));
        let time_remaining = (status > MachineStatus::CycleComplete).then(|| rng.gen_range(0..max_minutes) * 60);
        Machine::new(room_id, 0, num, machine_type).with_status(status, time_remaining)
    }
}

#[async_trait]
impl MachineGetter for RandomMachineGetter {
    fn name(&self) -> &'static str {
        "random"
    }

    async fn get_machines(&self, room_id: i64) -> Result<Vec<Machine>, FetchError> {
        let mut rng = rand::thread_rng();
        let third = RANDOM_CAPACITY / 3;
        let machines = (0..RANDOM_CAPACITY)
            .map(|num| {
                if num < third {
                    Self::machine(&mut rng, room_id, num, MachineType::Washer, 30)
                } else if num < 2 * third {
                    Self::machine(&mut rng, room_id, num, MachineType::Dryer, 60)
                } else {
                    Self::machine(&mut rng, room_id, num, MachineType::Washer, 1000)
                }
            })
            .collect();
        Ok(machines)
    }
}

/// Every machine moves one status "up" per call: Unknown, Unavailable, In Use,
/// Cycle Complete, Available, then around again
#[derive(Debug, Default)]
pub struct DescendingMachineGetter {
    iteration: AtomicU32,
}

impl DescendingMachineGetter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MachineGetter for DescendingMachineGetter {
    fn name(&self) -> &'static str {
        "descending"
    }

    async fn get_machines(&self, room_id: i64) -> Result<Vec<Machine>, FetchError> {
        let iteration = self.iteration.fetch_add(1, Ordering::Relaxed);
        #[allow(clippy::cast_possible_wrap)]
        let status = MachineStatus::from_ordinal(4 - (iteration % 5) as i32);
        let time_remaining = (status == MachineStatus::InUse).then_some(60);
        let third = DESCENDING_COUNT / 3;

        Ok((0..DESCENDING_COUNT)
            .map(|num| {
                let machine_type = match num / third {
                    0 => MachineType::Washer,
                    1 => MachineType::Dryer,
                    _ => MachineType::Unknown,
                };
                Machine::new(room_id, -1, num, machine_type).with_status(status, time_remaining)
            })
            .collect())
    }
}

/// Serves readings set up front; rooms without readings answer 404
#[derive(Debug, Default)]
pub struct FixedMachineGetter {
    rooms: Mutex<HashMap<i64, Result<Vec<Machine>, u16>>>,
    calls: AtomicUsize,
}

impl FixedMachineGetter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_room(&self, room_id: i64, machines: Vec<Machine>) {
        self.rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(room_id, Ok(machines));
    }

    /// Make the room fail with the given HTTP status
    pub fn fail_room(&self, room_id: i64, status: u16) {
        self.rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(room_id, Err(status));
    }

    /// Number of fetches served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MachineGetter for FixedMachineGetter {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn get_machines(&self, room_id: i64) -> Result<Vec<Machine>, FetchError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        match rooms.get(&room_id) {
            Some(Ok(machines)) => Ok(machines.clone()),
            Some(Err(status)) => Err(FetchError::Status { room_id, status: *status }),
            None => Err(FetchError::Status { room_id, status: 404 }),
        }
    }
}
