//! Location API Endpoints
//!
//! Read-only access to the location tree.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::models::grouping::MachineGrouping;

/// Create location API routes
pub fn create_location_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_tree))
        .route("/rooms", get(list_rooms))
        .route("/closest", get(get_closest))
        .route("/:id", get(get_location))
}

#[derive(Debug, Deserialize)]
pub struct ClosestQuery {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Serialize)]
pub struct LocationResponse {
    #[serde(flatten)]
    pub grouping: MachineGrouping,
    pub parent_id: Option<i64>,
    /// Own color or the nearest inherited one
    pub effective_color: Option<String>,
}

pub async fn get_tree(State(state): State<AppState>) -> Json<MachineGrouping> {
    Json(state.locations.root().clone())
}

pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<MachineGrouping>> {
    Json(state.locations.rooms().into_iter().map(MachineGrouping::summary).collect())
}

pub async fn get_closest(
    State(state): State<AppState>,
    Query(query): Query<ClosestQuery>,
) -> AppResult<Json<MachineGrouping>> {
    if !query.lat.is_finite() || !query.lon.is_finite() {
        return Err(AppError::bad_request("Coordinates must be finite"));
    }
    state
        .locations
        .closest(query.lat, query.lon)
        .map(|node| Json(node.summary()))
        .ok_or_else(|| AppError::not_found("Location with coordinates"))
}

pub async fn get_location(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<LocationResponse>> {
    let locations = &state.locations;
    let grouping = locations.grouping(id).ok_or_else(|| AppError::not_found("Location"))?;
    Ok(Json(LocationResponse {
        grouping: grouping.clone(),
        parent_id: locations.parent_of(id).map(|parent| parent.id),
        effective_color: locations.color_of(id).map(str::to_string),
    }))
}
