//! Snapshot and status endpoints.

use crate::api::AppState;
use crate::api::error::ApiResult;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use engram_core::{SnapshotStats, StoreStatus};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/snapshot/save", post(save_snapshot))
        .route("/api/v1/snapshot/restore", post(restore_snapshot))
        .route("/api/v1/status", get(status))
}

/// POST /api/v1/snapshot/save
async fn save_snapshot(State(state): State<AppState>) -> ApiResult<Json<SnapshotStats>> {
    Ok(Json(state.store.save_snapshot()?))
}

/// POST /api/v1/snapshot/restore
///
/// Destructive: in-memory state is replaced by the latest snapshot.
async fn restore_snapshot(State(state): State<AppState>) -> ApiResult<Json<SnapshotStats>> {
    Ok(Json(state.store.restore_snapshot()?))
}

/// GET /api/v1/status
async fn status(State(state): State<AppState>) -> Json<StoreStatus> {
    Json(state.store.status())
}
