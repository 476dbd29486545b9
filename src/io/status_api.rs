//! JSON status API source
//!
//! `GET {base}/status/{room_id}` returns an array of machine objects.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Instant;
use tracing::debug;
use url::Url;

use super::{FetchError, MachineGetter};
use crate::logging::elapsed_millis;
use crate::models::machine::{Machine, MachineStatus, MachineType, NO_ESUDS_ID};

/// One machine as reported by the status API
#[derive(Debug, Clone, Deserialize)]
pub struct StatusEntry {
    #[serde(default = "no_esuds_id")]
    pub esuds_id: i64,
    #[serde(default = "no_number")]
    pub number: i32,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "type", default)]
    pub machine_type: Option<String>,
    /// Seconds; negative or missing means no time remaining
    #[serde(rename = "timeRemaining", default)]
    pub time_remaining: Option<i64>,
}

fn no_esuds_id() -> i64 {
    NO_ESUDS_ID
}

fn no_number() -> i32 {
    -1
}

impl StatusEntry {
    pub fn into_machine(self, room_id: i64) -> Machine {
        // the API reports anything it does not recognise as out of service
        let status = match self.status.as_deref() {
            None => MachineStatus::Unknown,
            Some(text) => match MachineStatus::parse_label(text) {
                MachineStatus::Unknown => MachineStatus::Unavailable,
                known => known,
            },
        };
        let machine_type = self
            .machine_type
            .as_deref()
            .map_or(MachineType::Unknown, MachineType::parse_label);
        let time_remaining = self.time_remaining.and_then(Machine::time_remaining_from_wire);

        Machine::new(room_id, self.esuds_id, self.number, machine_type).with_status(status, time_remaining)
    }
}

/// Client for the JSON status API
#[derive(Debug, Clone)]
pub struct StatusApiMachineGetter {
    client: reqwest::Client,
    base_url: Url,
}

impl StatusApiMachineGetter {
    pub fn new(client: reqwest::Client, base_url: &str) -> Result<Self, FetchError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    pub fn room_url(&self, room_id: i64) -> Result<Url, FetchError> {
        Ok(self.base_url.join(&format!("status/{room_id}"))?)
    }
}

/// Convert a decoded response body into machines
pub fn machines_from_entries(room_id: i64, entries: Vec<StatusEntry>) -> Vec<Machine> {
    entries.into_iter().map(|e| e.into_machine(room_id)).collect()
}

#[async_trait]
impl MachineGetter for StatusApiMachineGetter {
    fn name(&self) -> &'static str {
        "status-api"
    }

    async fn get_machines(&self, room_id: i64) -> Result<Vec<Machine>, FetchError> {
        let started = Instant::now();
        let response = self.client.get(self.room_url(room_id)?).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                room_id,
                status: response.status().as_u16(),
            });
        }
        let entries: Vec<StatusEntry> = response.json().await?;
        let machines = machines_from_entries(room_id, entries);
        debug!(
            room_id,
            machines = machines.len(),
            duration_ms = elapsed_millis(started),
            "Loaded room from status API"
        );
        Ok(machines)
    }
}
