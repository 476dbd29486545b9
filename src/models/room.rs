//! Room Model
//!
//! The machines of one laundry room, grouped by machine type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use super::machine::{Machine, MachineType};

/// Machines of a single room, kept per type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    /// When the readings in this room were fetched from the provider
    pub loaded_at: DateTime<Utc>,
    washers: Vec<Machine>,
    dryers: Vec<Machine>,
    others: Vec<Machine>,
}

impl Room {
    pub fn new(id: i64, loaded_at: DateTime<Utc>) -> Self {
        Self {
            id,
            loaded_at,
            washers: Vec::new(),
            dryers: Vec::new(),
            others: Vec::new(),
        }
    }

    /// Build a sorted room from a list of machines
    pub fn from_machines(id: i64, loaded_at: DateTime<Utc>, machines: impl IntoIterator<Item = Machine>) -> Self {
        let mut room = Self::new(id, loaded_at);
        room.extend(machines);
        room.sort();
        room
    }

    fn group_mut(&mut self, machine_type: MachineType) -> &mut Vec<Machine> {
        match machine_type {
            MachineType::Washer => &mut self.washers,
            MachineType::Dryer => &mut self.dryers,
            MachineType::Unknown => &mut self.others,
        }
    }

    pub fn get(&self, machine_type: MachineType) -> &[Machine] {
        match machine_type {
            MachineType::Washer => &self.washers,
            MachineType::Dryer => &self.dryers,
            MachineType::Unknown => &self.others,
        }
    }

    pub fn add(&mut self, machine: Machine) {
        self.group_mut(machine.machine_type).push(machine);
    }

    pub fn extend(&mut self, machines: impl IntoIterator<Item = Machine>) {
        for machine in machines {
            self.add(machine);
        }
    }

    /// Look up a machine by type and number
    pub fn machine(&self, machine_type: MachineType, num: i32) -> Option<&Machine> {
        self.get(machine_type).iter().find(|m| m.num == num)
    }

    pub fn has(&self, machine_type: MachineType) -> bool {
        !self.get(machine_type).is_empty()
    }

    /// Types with at least one machine, in declaration order
    pub fn types(&self) -> Vec<MachineType> {
        MachineType::iter().filter(|t| self.has(*t)).collect()
    }

    pub fn washers(&self) -> &[Machine] {
        &self.washers
    }

    pub fn dryers(&self) -> &[Machine] {
        &self.dryers
    }

    pub fn others(&self) -> &[Machine] {
        &self.others
    }

    pub fn len(&self) -> usize {
        self.washers.len() + self.dryers.len() + self.others.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Washers, then dryers, then everything else
    pub fn iter(&self) -> impl Iterator<Item = &Machine> {
        self.washers.iter().chain(self.dryers.iter()).chain(self.others.iter())
    }

    pub fn sort(&mut self) {
        self.washers.sort();
        self.dryers.sort();
        self.others.sort();
    }

    /// Age of the readings relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.loaded_at
    }
}

impl<'a> IntoIterator for &'a Room {
    type Item = &'a Machine;
    type IntoIter = Box<dyn Iterator<Item = &'a Machine> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
