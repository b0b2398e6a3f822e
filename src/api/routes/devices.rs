//! Device Routes
//!
//! - GET /api/devices - List every registered device

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::state::AppState;
use crate::relay::Device;

/// GET /api/devices
///
/// Full registry snapshot, in no particular order.
pub async fn list_devices(State(state): State<Arc<AppState>>) -> Json<Vec<Device>> {
    Json(state.query.list_devices().await)
}
