//! Data Routes
//!
//! Latest readings per device.
//!
//! - GET /api/data - Latest reading of every device that has reported
//! - GET /api/data/:deviceId - Latest reading of one device

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::relay::Reading;

/// GET /api/data
pub async fn list_latest(State(state): State<Arc<AppState>>) -> Json<Vec<Reading>> {
    Json(state.query.list_latest().await)
}

/// GET /api/data/:deviceId
///
/// 404 when the device is unknown or has not reported yet.
pub async fn get_latest(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<Reading>> {
    state
        .query
        .get_latest(&device_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Device not found".to_string()))
}
