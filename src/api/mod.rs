//! API module for WasherCheck
//!
//! Contains all REST API endpoints and routing.

pub mod locations;
pub mod notifications;
pub mod rooms;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::database::DatabaseManager;
use crate::models::grouping::Locations;
use crate::services::{NotificationService, RoomRefresher};

pub use locations::create_location_routes;
pub use notifications::create_notification_routes;
pub use rooms::create_room_routes;

/// Shared state of every handler
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseManager,
    pub refresher: RoomRefresher,
    pub notifications: NotificationService,
    pub locations: Arc<Locations>,
    /// Readings younger than this are served from the database
    pub cache_max_age: chrono::Duration,
}

/// All API routes, without middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .nest("/api/rooms", create_room_routes())
        .nest("/api/notifications", create_notification_routes())
        .nest("/api/locations", create_location_routes())
        .with_state(state)
}

/// API routes with request tracing and CORS
pub fn create_app(state: AppState, cors_origins: &[String]) -> Router {
    create_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(cors_origins)),
    )
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(allowed)
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
}

/// Service and database liveness
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = state.db.test_connection().await.is_ok();
    Json(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}
