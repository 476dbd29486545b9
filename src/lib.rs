//! WasherCheck
//!
//! Tracks laundry machines in campus laundry rooms and tells people when the
//! machine they are waiting on is ready.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod form;
pub mod io;
pub mod logging;
pub mod models;
pub mod services;
