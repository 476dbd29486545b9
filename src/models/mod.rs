//! Models module for WasherCheck
//!
//! Machines, rooms, notifications and the location tree.

pub mod grouping;
pub mod machine;
pub mod notification;
pub mod room;

// Re-export commonly used types
pub use grouping::{Locations, MachineGrouping};
pub use machine::{Machine, MachineStatus, MachineType};
pub use notification::{CompletedNotification, NewNotification, PendingNotification};
pub use room::Room;
