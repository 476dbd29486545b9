//! Room API Endpoints
//!
//! Machine readings per room and on-demand refreshes.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::models::machine::Machine;
use crate::models::room::Room;
use crate::services::{duration_from_secs, RefreshReport};

/// Create room API routes
pub fn create_room_routes() -> Router<AppState> {
    Router::new()
        .route("/refresh", post(refresh_rooms))
        .route("/:room_id/machines", get(get_room_machines))
        .route("/:room_id/machines/records", get(get_room_records))
}

#[derive(Debug, Default, Deserialize)]
pub struct RoomQuery {
    /// Seconds; overrides the configured cache age
    pub max_age: Option<u64>,
}

impl RoomQuery {
    fn max_age(&self, state: &AppState) -> AppResult<chrono::Duration> {
        match self.max_age {
            None => Ok(state.cache_max_age),
            Some(secs) => duration_from_secs(secs).ok_or_else(|| AppError::bad_request("max_age is out of range")),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub room_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: RefreshReport,
}

/// Machines of a room, from cache when fresh enough
pub async fn get_room_machines(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Query(query): Query<RoomQuery>,
) -> AppResult<Json<Room>> {
    let room = state.refresher.room(room_id, query.max_age(&state)?).await?;
    Ok(Json(room))
}

/// Machines of a room as concatenated binary records
pub async fn get_room_records(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Query(query): Query<RoomQuery>,
) -> AppResult<impl IntoResponse> {
    let room = state.refresher.room(room_id, query.max_age(&state)?).await?;
    let body = Machine::encode_records(room.iter());
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], body))
}

/// Refresh the listed rooms, or the default room when none are listed.
/// An empty body counts as no rooms; anything else must be a valid request.
pub async fn refresh_rooms(State(state): State<AppState>, body: Bytes) -> AppResult<Json<RefreshResponse>> {
    let request: RefreshRequest = if body.is_empty() {
        RefreshRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::bad_request(&format!("Invalid refresh request: {e}")))?
    };
    let report = state.refresher.refresh(&request.room_ids).await;
    Ok(Json(RefreshResponse {
        success: report.is_success(),
        report,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_router;
    use crate::api::test_support::test_app;
    use crate::models::machine::{MachineStatus, MachineType};
    use axum_test::TestServer;
    use serde_json::json;

    fn machines(room_id: i64) -> Vec<Machine> {
        vec![
            Machine::new(room_id, 501, 1, MachineType::Washer).with_status(MachineStatus::Available, None),
            Machine::new(room_id, 502, 2, MachineType::Dryer).with_status(MachineStatus::InUse, Some(420)),
        ]
    }

    #[tokio::test]
    async fn test_get_room_machines() {
        let app = test_app().await;
        app.getter.set_room(1434, machines(1434));
        let server = TestServer::new(create_router(app.state)).unwrap();

        let response = server.get("/api/rooms/1434/machines").await;
        assert_eq!(response.status_code(), 200);

        let json_response: serde_json::Value = response.json();
        assert_eq!(json_response["id"], 1434);
        assert_eq!(json_response["washers"][0]["status"], "AVAILABLE");
        assert_eq!(json_response["dryers"][0]["time_remaining"], 420);
        assert!(json_response["washers"][0]["time_remaining"].is_null());
    }

    #[tokio::test]
    async fn test_room_is_cached() {
        let app = test_app().await;
        app.getter.set_room(1434, machines(1434));
        let getter = app.getter.clone();
        let clock = app.clock.clone();
        let server = TestServer::new(create_router(app.state)).unwrap();

        server.get("/api/rooms/1434/machines").await;
        server.get("/api/rooms/1434/machines").await;
        assert_eq!(getter.calls(), 1);

        server.get("/api/rooms/1434/machines?max_age=0").await;
        assert_eq!(getter.calls(), 1, "age zero is still fresh at the same instant");

        clock.advance(chrono::Duration::seconds(61));
        server.get("/api/rooms/1434/machines").await;
        assert_eq!(getter.calls(), 2);
    }

    #[tokio::test]
    async fn test_unknown_room_from_source() {
        let app = test_app().await;
        let server = TestServer::new(create_router(app.state)).unwrap();

        let response = server.get("/api/rooms/9999/machines").await;
        assert_eq!(response.status_code(), 404);
        let json_response: serde_json::Value = response.json();
        assert_eq!(json_response["error"], "MachineSourceError");
    }

    #[tokio::test]
    async fn test_room_records() {
        let app = test_app().await;
        app.getter.set_room(7, machines(7));
        let server = TestServer::new(create_router(app.state)).unwrap();

        let response = server.get("/api/rooms/7/machines/records").await;
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.header("content-type"), "application/octet-stream");

        let decoded = Machine::decode_records(response.as_bytes()).unwrap();
        assert_eq!(decoded, machines(7));
    }

    #[tokio::test]
    async fn test_refresh_rooms() {
        let app = test_app().await;
        app.getter.set_room(1, machines(1));
        app.getter.fail_room(2, 503);
        let server = TestServer::new(create_router(app.state)).unwrap();

        let response = server.post("/api/rooms/refresh").json(&json!({"room_ids": [1, 2]})).await;
        assert_eq!(response.status_code(), 200);

        let json_response: serde_json::Value = response.json();
        assert_eq!(json_response["success"], false);
        assert_eq!(json_response["rooms"][0]["result"], "refreshed");
        assert_eq!(json_response["rooms"][0]["machines"], 2);
        assert_eq!(json_response["rooms"][1]["result"], "failed");
        assert_eq!(json_response["rooms"][1]["room_id"], 2);
    }

    #[tokio::test]
    async fn test_refresh_without_body_uses_default_room() {
        let app = test_app().await;
        app.getter.set_room(1434, machines(1434));
        let server = TestServer::new(create_router(app.state)).unwrap();

        let response = server.post("/api/rooms/refresh").await;
        let json_response: serde_json::Value = response.json();
        assert_eq!(json_response["success"], true);
        assert_eq!(json_response["rooms"][0]["room_id"], 1434);
    }

    #[tokio::test]
    async fn test_malformed_refresh_body_is_rejected() {
        let app = test_app().await;
        app.getter.set_room(1434, machines(1434));
        let getter = app.getter.clone();
        let server = TestServer::new(create_router(app.state)).unwrap();

        let response = server.post("/api/rooms/refresh").text("{\"room_ids\": [1,").await;
        assert_eq!(response.status_code(), 400);
        let json_response: serde_json::Value = response.json();
        assert_eq!(json_response["error"], "BadRequest");
        assert_eq!(getter.calls(), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_max_age_is_rejected() {
        let app = test_app().await;
        app.getter.set_room(1434, machines(1434));
        let server = TestServer::new(create_router(app.state)).unwrap();

        let response = server.get("/api/rooms/1434/machines?max_age=10000000000000000").await;
        assert_eq!(response.status_code(), 400);

        let response = server.get("/api/rooms/1434/machines/records?max_age=18446744073709551615").await;
        assert_eq!(response.status_code(), 400);

        let response = server.get("/api/rooms/1434/machines?max_age=86400").await;
        assert_eq!(response.status_code(), 200);
    }
}
