//! Library endpoints.

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use engram_core::{
    BuildReport, CreateLibrary, EngramId, IndexKind, IndexOptions, Library, LibraryUpdate,
    Metadata,
};
use serde::Deserialize;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/libraries", post(create_library).get(list_libraries))
        .route(
            "/api/v1/libraries/{id}",
            get(get_library).put(update_library).delete(delete_library),
        )
        .route("/api/v1/libraries/{id}/build-index", post(build_index))
}

#[derive(Debug, Deserialize)]
struct CreateLibraryPayload {
    name: String,
    index_kind: String,
    #[serde(default)]
    index_options: IndexOptions,
    #[serde(default)]
    metadata: Metadata,
}

/// POST /api/v1/libraries
///
/// The payload is validated by hand so that an unknown index kind or a bad
/// option shape comes back as 400 rather than a generic decode rejection.
async fn create_library(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> ApiResult<(StatusCode, Json<Library>)> {
    let payload: CreateLibraryPayload = serde_json::from_value(payload)
        .map_err(|e| ApiError::bad_request(format!("invalid library payload: {e}")))?;
    let index_kind: IndexKind = payload.index_kind.parse()?;

    let library = state.store.create_library(CreateLibrary {
        name: payload.name,
        index_kind,
        index_options: payload.index_options,
        metadata: payload.metadata,
    })?;
    Ok((StatusCode::CREATED, Json(library)))
}

/// GET /api/v1/libraries
async fn list_libraries(State(state): State<AppState>) -> Json<Vec<Library>> {
    Json(state.store.list_libraries())
}

/// GET /api/v1/libraries/{id}
async fn get_library(
    State(state): State<AppState>,
    Path(id): Path<EngramId>,
) -> ApiResult<Json<Library>> {
    Ok(Json(state.store.get_library(id)?))
}

/// PUT /api/v1/libraries/{id}
async fn update_library(
    State(state): State<AppState>,
    Path(id): Path<EngramId>,
    Json(update): Json<LibraryUpdate>,
) -> ApiResult<Json<Library>> {
    Ok(Json(state.store.update_library(id, update)?))
}

/// DELETE /api/v1/libraries/{id}
async fn delete_library(
    State(state): State<AppState>,
    Path(id): Path<EngramId>,
) -> ApiResult<StatusCode> {
    state.store.delete_library(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/libraries/{id}/build-index
async fn build_index(
    State(state): State<AppState>,
    Path(id): Path<EngramId>,
) -> ApiResult<Json<BuildReport>> {
    let report = state.store.rebuild_index(id)?;
    if report.total_vectors == 0 {
        return Err(ApiError::bad_request("library has no vectors to index"));
    }
    Ok(Json(report))
}
