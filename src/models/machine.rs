//! Machine Model
//!
//! A single washer or dryer, its status reading and the fixed-order binary
//! record used to persist and transfer it.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use strum::{Display, EnumCount, EnumIter, IntoEnumIterator};

/// Wire value for "no time remaining"
pub const NO_TIME_REMAINING: i64 = -1;

/// Longest time remaining a machine can carry; the record field is a signed 64-bit value
pub const MAX_TIME_REMAINING: u64 = i64::MAX.unsigned_abs();

/// Wire value for a machine without a provider identifier
pub const NO_ESUDS_ID: i64 = -1;

/// Size in bytes of one encoded machine record
pub const RECORD_LEN: usize = 8 + 8 + 4 + 4 + 4 + 8;

/// Kind of machine. Declaration order is significant for ordering and ordinals.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumIter, EnumCount,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineType {
    #[strum(to_string = "Washer")]
    Washer,
    #[strum(to_string = "Dryer")]
    Dryer,
    #[strum(to_string = "Unknown")]
    Unknown,
}

impl MachineType {
    /// Decode an ordinal; anything outside the known variants is `Unknown`.
    pub fn from_ordinal(ordinal: i32) -> Self {
        usize::try_from(ordinal)
            .ok()
            .and_then(|index| Self::iter().nth(index))
            .unwrap_or(MachineType::Unknown)
    }

    pub fn ordinal(self) -> i32 {
        match self {
            MachineType::Washer => 0,
            MachineType::Dryer => 1,
            MachineType::Unknown => 2,
        }
    }

    /// Classify free-form provider text ("Front Load Washer", "dryer #2")
    pub fn parse_label(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("washer") {
            MachineType::Washer
        } else if lower.contains("dryer") {
            MachineType::Dryer
        } else {
            MachineType::Unknown
        }
    }
}

/// Machine status. Earlier variants are "better" for someone waiting on a machine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumIter, EnumCount,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineStatus {
    #[strum(to_string = "Available")]
    Available,
    #[strum(to_string = "Cycle Complete")]
    CycleComplete,
    #[strum(to_string = "In Use")]
    InUse,
    #[strum(to_string = "Unavailable")]
    Unavailable,
    #[strum(to_string = "Unknown")]
    Unknown,
}

impl MachineStatus {
    /// Decode an ordinal; anything outside the known variants is `Unknown`.
    pub fn from_ordinal(ordinal: i32) -> Self {
        usize::try_from(ordinal)
            .ok()
            .and_then(|index| Self::iter().nth(index))
            .unwrap_or(MachineStatus::Unknown)
    }

    pub fn ordinal(self) -> i32 {
        match self {
            MachineStatus::Available => 0,
            MachineStatus::CycleComplete => 1,
            MachineStatus::InUse => 2,
            MachineStatus::Unavailable => 3,
            MachineStatus::Unknown => 4,
        }
    }

    /// Match provider status text case-insensitively
    pub fn parse_label(text: &str) -> Self {
        match text.trim().to_lowercase().as_str() {
            "available" => MachineStatus::Available,
            "cycle complete" => MachineStatus::CycleComplete,
            "in use" => MachineStatus::InUse,
            "unavailable" => MachineStatus::Unavailable,
            _ => MachineStatus::Unknown,
        }
    }

    /// True when `self` is `other` or a status declared before it
    pub fn is_at_least_as_good_as(self, other: MachineStatus) -> bool {
        self <= other
    }
}

/// Machine record decoding errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MachineRecordError {
    #[error("Machine record truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// One physical washer or dryer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Machine {
    pub room_id: i64,
    pub esuds_id: i64,
    pub num: i32,
    pub machine_type: MachineType,
    pub status: MachineStatus,
    /// Seconds until the current cycle ends; `None` when the provider gave no time.
    /// Never above [`MAX_TIME_REMAINING`].
    #[serde(default, deserialize_with = "deserialize_time_remaining")]
    time_remaining: Option<u64>,
}

fn deserialize_time_remaining<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.map(cap_time_remaining))
}

fn cap_time_remaining(secs: u64) -> u64 {
    secs.min(MAX_TIME_REMAINING)
}

impl Machine {
    /// New machine with an unknown status and no time remaining
    pub fn new(room_id: i64, esuds_id: i64, num: i32, machine_type: MachineType) -> Self {
        Self {
            room_id,
            esuds_id,
            num,
            machine_type,
            status: MachineStatus::Unknown,
            time_remaining: None,
        }
    }

    pub fn with_status(mut self, status: MachineStatus, time_remaining: Option<u64>) -> Self {
        self.update_reading(status, time_remaining);
        self
    }

    /// Seconds until the current cycle ends
    pub fn time_remaining(&self) -> Option<u64> {
        self.time_remaining
    }

    pub fn has_time_remaining(&self) -> bool {
        self.time_remaining.is_some()
    }

    /// Apply a new status reading. Identity fields never change; times above
    /// [`MAX_TIME_REMAINING`] are capped to it.
    pub fn update_reading(&mut self, status: MachineStatus, time_remaining: Option<u64>) {
        self.status = status;
        self.time_remaining = time_remaining.map(cap_time_remaining);
    }

    /// Identifier that stays stable across readings of the same machine
    pub fn static_id(&self) -> i64 {
        (self.room_id << 32) | (i64::from(self.machine_type.ordinal()) << 30) | i64::from(self.num & 0x3FFF_FFFF)
    }

    /// Time remaining as stored on the wire
    pub fn time_remaining_wire(&self) -> i64 {
        self.time_remaining
            .map_or(NO_TIME_REMAINING, |secs| i64::try_from(secs).unwrap_or(i64::MAX))
    }

    /// Time remaining from its wire value; any negative value is the sentinel
    pub fn time_remaining_from_wire(value: i64) -> Option<u64> {
        u64::try_from(value).ok()
    }

    /// Append this machine's binary record to `out`
    pub fn write_record(&self, out: &mut Vec<u8>) {
        out.reserve(RECORD_LEN);
        out.extend_from_slice(&self.room_id.to_be_bytes());
        out.extend_from_slice(&self.esuds_id.to_be_bytes());
        out.extend_from_slice(&self.num.to_be_bytes());
        out.extend_from_slice(&self.machine_type.ordinal().to_be_bytes());
        out.extend_from_slice(&self.status.ordinal().to_be_bytes());
        out.extend_from_slice(&self.time_remaining_wire().to_be_bytes());
    }

    pub fn encode_record(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RECORD_LEN);
        self.write_record(&mut out);
        out
    }

    /// Decode one record from the front of `bytes`, returning the unread tail
    pub fn read_record(bytes: &[u8]) -> Result<(Self, &[u8]), MachineRecordError> {
        if bytes.len() < RECORD_LEN {
            return Err(MachineRecordError::Truncated {
                expected: RECORD_LEN,
                actual: bytes.len(),
            });
        }
        let (record, rest) = bytes.split_at(RECORD_LEN);
        let mut reader = RecordReader { bytes: record };

        let machine = Machine {
            room_id: reader.i64(),
            esuds_id: reader.i64(),
            num: reader.i32(),
            machine_type: MachineType::from_ordinal(reader.i32()),
            status: MachineStatus::from_ordinal(reader.i32()),
            time_remaining: Self::time_remaining_from_wire(reader.i64()),
        };
        Ok((machine, rest))
    }

    pub fn decode_record(bytes: &[u8]) -> Result<Self, MachineRecordError> {
        Self::read_record(bytes).map(|(machine, _)| machine)
    }

    /// Concatenated records for a list of machines
    pub fn encode_records<'a>(machines: impl IntoIterator<Item = &'a Machine>) -> Vec<u8> {
        let mut out = Vec::new();
        for machine in machines {
            machine.write_record(&mut out);
        }
        out
    }

    pub fn decode_records(mut bytes: &[u8]) -> Result<Vec<Self>, MachineRecordError> {
        let mut machines = Vec::with_capacity(bytes.len() / RECORD_LEN);
        while !bytes.is_empty() {
            let (machine, rest) = Self::read_record(bytes)?;
            machines.push(machine);
            bytes = rest;
        }
        Ok(machines)
    }
}

/// Cursor over a record already checked to be `RECORD_LEN` long
struct RecordReader<'a> {
    bytes: &'a [u8],
}

impl RecordReader<'_> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut buf = [0u8; N];
        let (head, tail) = self.bytes.split_at(N);
        buf.copy_from_slice(head);
        self.bytes = tail;
        buf
    }

    fn i64(&mut self) -> i64 {
        i64::from_be_bytes(self.take::<8>())
    }

    fn i32(&mut self) -> i32 {
        i32::from_be_bytes(self.take::<4>())
    }
}

impl Ord for Machine {
    fn cmp(&self, other: &Self) -> Ordering {
        self.room_id
            .cmp(&other.room_id)
            .then_with(|| self.machine_type.cmp(&other.machine_type))
            .then_with(|| self.status.cmp(&other.status))
            .then_with(|| match (self.time_remaining, other.time_remaining) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(&b),
            })
            .then_with(|| self.num.cmp(&other.num))
            .then_with(|| self.esuds_id.cmp(&other.esuds_id))
    }
}

impl PartialOrd for Machine {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Machine{{roomId={}, id={}, num={}, type={}, status={}",
            self.room_id, self.esuds_id, self.num, self.machine_type, self.status
        )?;
        if let Some(secs) = self.time_remaining {
            write!(f, ", timeRemaining={secs}")?;
        }
        write!(f, "}}")
    }
}
