//! Services module for WasherCheck
//!
//! Contains all business logic and service implementations.

pub mod notification_checker;
pub mod notification_service;
pub mod room_refresher;
pub mod time_provider;

// Re-export commonly used services
pub use notification_checker::NotificationChecker;
pub use notification_service::{CheckOutcome, LogNotifier, NotificationService, Notifier, WebhookNotifier};
pub use room_refresher::{RefreshReport, RoomOutcome, RoomRefresher};
pub use time_provider::{duration_from_secs, MockTimeProvider, SystemTimeProvider, TimeProvider};
