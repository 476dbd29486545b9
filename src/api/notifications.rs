//! Notification API Endpoints
//!
//! Arm, list and cancel "machine ready" notifications.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};

use super::AppState;
use crate::error::AppResult;
use crate::models::notification::{CompletedNotification, NewNotification, PendingNotification};
use crate::services::CheckOutcome;

/// Create notification API routes
pub fn create_notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications).post(create_notification))
        .route("/completed", get(list_completed).delete(clear_completed))
        .route("/check", post(check_notifications))
        .route("/:id", get(get_notification).delete(delete_notification))
}

pub async fn list_notifications(State(state): State<AppState>) -> AppResult<Json<Vec<PendingNotification>>> {
    Ok(Json(state.notifications.list().await?))
}

pub async fn create_notification(
    State(state): State<AppState>,
    Json(request): Json<NewNotification>,
) -> AppResult<(StatusCode, Json<PendingNotification>)> {
    let created = state.notifications.create(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_notification(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<PendingNotification>> {
    Ok(Json(state.notifications.get(id).await?))
}

pub async fn delete_notification(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<StatusCode> {
    state.notifications.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_completed(State(state): State<AppState>) -> AppResult<Json<Vec<CompletedNotification>>> {
    Ok(Json(state.notifications.completed().await?))
}

pub async fn clear_completed(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let removed = state.notifications.clear_completed().await?;
    Ok(Json(json!({ "removed": removed })))
}

/// Run a notification check now
pub async fn check_notifications(State(state): State<AppState>) -> AppResult<Json<CheckOutcome>> {
    Ok(Json(state.notifications.check_pending().await?))
}

#[cfg(test)]
mod tests {
    use crate::api::create_router;
    use crate::api::test_support::test_app;
    use crate::models::machine::{Machine, MachineStatus, MachineType};
    use axum_test::TestServer;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_fetch_notification() {
        let app = test_app().await;
        let server = TestServer::new(create_router(app.state)).unwrap();

        let response = server
            .post("/api/notifications")
            .json(&json!({"room_id": 1434, "machine_num": 3, "machine_type": "WASHER"}))
            .await;
        assert_eq!(response.status_code(), 201);

        let created: serde_json::Value = response.json();
        assert_eq!(created["desired_status"], "CYCLE_COMPLETE");
        assert_eq!(created["extended"], "NORMAL");
        let id = created["id"].as_i64().unwrap();

        let response = server.get(&format!("/api/notifications/{id}")).await;
        assert_eq!(response.status_code(), 200);

        let list: serde_json::Value = server.get("/api/notifications").await.json();
        assert_eq!(list.as_array().unwrap().len(), 1);

        let response = server.delete(&format!("/api/notifications/{id}")).await;
        assert_eq!(response.status_code(), 204);

        let response = server.get(&format!("/api/notifications/{id}")).await;
        assert_eq!(response.status_code(), 404);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "NotificationNotFound");
    }

    #[tokio::test]
    async fn test_invalid_notification_is_rejected() {
        let app = test_app().await;
        let server = TestServer::new(create_router(app.state)).unwrap();

        let response = server
            .post("/api/notifications")
            .json(&json!({
                "room_id": 1434,
                "machine_num": 3,
                "machine_type": "WASHER",
                "desired_status": "UNAVAILABLE"
            }))
            .await;
        assert_eq!(response.status_code(), 400);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "InvalidNotification");
    }

    #[tokio::test]
    async fn test_check_moves_ready_machines_to_history() {
        let app = test_app().await;
        app.getter.set_room(
            1434,
            vec![Machine::new(1434, 1, 3, MachineType::Washer).with_status(MachineStatus::Available, None)],
        );
        let server = TestServer::new(create_router(app.state)).unwrap();

        server
            .post("/api/notifications")
            .json(&json!({"room_id": 1434, "machine_num": 3, "machine_type": "WASHER"}))
            .await;

        let outcome: serde_json::Value = server.post("/api/notifications/check").await.json();
        assert_eq!(outcome["completed"].as_array().unwrap().len(), 1);
        assert_eq!(outcome["pending"], 0);
        assert!(outcome["next_check"].is_null());

        let completed: serde_json::Value = server.get("/api/notifications/completed").await.json();
        assert_eq!(completed[0]["final_status"], "AVAILABLE");
        assert_eq!(completed[0]["machine_num"], 3);

        let cleared: serde_json::Value = server.delete("/api/notifications/completed").await.json();
        assert_eq!(cleared["removed"], 1);
    }
}
