//! Database layer
//!
//! SQLite persistence for machine readings and notifications using SQLx.

pub mod connection;
mod machines;
mod notifications;
mod types;

pub use connection::DatabaseManager;
