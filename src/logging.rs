//! Logging configuration for WasherCheck
//!
//! Structured logging setup with appropriate levels and formatting.

use std::time::Instant;
use tracing::Subscriber;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

const DEFAULT_FILTER: &str = "washercheck=info,tower_http=info,axum::rejection=trace";

/// Initialize the application logging system.
///
/// `json` selects machine-readable output; otherwise a compact console format
/// is used. `RUST_LOG` wins over `log_level` when set.
pub fn init_logging(log_level: &str, json: bool) {
    let fallback = if log_level.is_empty() || log_level == "info" {
        DEFAULT_FILTER.to_string()
    } else {
        format!("washercheck={log_level},tower_http={log_level}")
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let result = Registry::default()
        .with(env_filter)
        .with(json.then(json_layer))
        .with((!json).then(console_layer))
        .try_init();

    // a second init (tests) keeps the first subscriber
    if result.is_ok() {
        tracing::info!(json, "Logging system initialized");
    }
}

/// JSON logging layer for production
fn json_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
}

/// Console logging layer for development
fn console_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_ansi(true)
}

/// Create a span for a room refresh
#[macro_export]
macro_rules! refresh_span {
    ($room_id:expr) => {
        tracing::info_span!(
            "room_refresh",
            room_id = %$room_id,
            machines = tracing::field::Empty,
        )
    };
}

/// Log application startup
pub fn log_startup() {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        git_commit = option_env!("GIT_COMMIT").unwrap_or("unknown"),
        "WasherCheck starting up"
    );
}

/// Log the outcome of fetching one room
pub fn log_room_refresh(room_id: i64, source: &str, machines: Option<usize>, duration_ms: u64) {
    match machines {
        Some(machines) => tracing::info!(
            room_id,
            source = %source,
            machines,
            duration_ms,
            "Room refreshed"
        ),
        None => tracing::warn!(room_id, source = %source, duration_ms, "Room refresh failed"),
    }
}

/// Log notification delivery
pub fn log_notification_delivery(count: usize, delivery_method: &str, success: bool) {
    if success {
        tracing::info!(
            count,
            delivery_method = %delivery_method,
            "Notification delivered successfully"
        );
    } else {
        tracing::warn!(
            count,
            delivery_method = %delivery_method,
            "Notification delivery failed"
        );
    }
}

/// Milliseconds since `started`, saturating
pub fn elapsed_millis(started: Instant) -> u64 {
    started.elapsed().as_millis().try_into().unwrap_or(u64::MAX)
}

/// Log database operation
pub fn log_database_operation(operation: &str, table: &str, duration_ms: u64, rows_affected: Option<u64>) {
    tracing::debug!(
        operation = %operation,
        table = %table,
        duration_ms,
        rows_affected = ?rows_affected,
        "Database operation completed"
    );
}
