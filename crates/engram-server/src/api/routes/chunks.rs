//! Chunk endpoints.

use crate::api::AppState;
use crate::api::error::ApiResult;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use engram_core::{Chunk, ChunkUpdate, CreateChunk, EngramId};
use serde::Deserialize;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/documents/{id}/chunks",
            get(list_chunks).post(create_chunk),
        )
        .route("/api/v1/documents/{id}/chunks/bulk", post(bulk_create_chunks))
        .route(
            "/api/v1/chunks/{id}",
            get(get_chunk).put(update_chunk).delete(delete_chunk),
        )
}

/// POST /api/v1/documents/{id}/chunks
async fn create_chunk(
    State(state): State<AppState>,
    Path(document_id): Path<EngramId>,
    Json(payload): Json<CreateChunk>,
) -> ApiResult<(StatusCode, Json<Chunk>)> {
    let chunk = state.store.create_chunk(document_id, payload)?;
    Ok((StatusCode::CREATED, Json(chunk)))
}

#[derive(Debug, Deserialize)]
struct BulkCreateChunksPayload {
    chunks: Vec<CreateChunk>,
}

/// POST /api/v1/documents/{id}/chunks/bulk
///
/// Atomic: one bad element rejects the whole batch.
async fn bulk_create_chunks(
    State(state): State<AppState>,
    Path(document_id): Path<EngramId>,
    Json(payload): Json<BulkCreateChunksPayload>,
) -> ApiResult<(StatusCode, Json<Vec<Chunk>>)> {
    let chunks = state.store.bulk_create_chunks(document_id, payload.chunks)?;
    Ok((StatusCode::CREATED, Json(chunks)))
}

/// GET /api/v1/documents/{id}/chunks
async fn list_chunks(
    State(state): State<AppState>,
    Path(document_id): Path<EngramId>,
) -> ApiResult<Json<Vec<Chunk>>> {
    Ok(Json(state.store.list_chunks(document_id)?))
}

/// GET /api/v1/chunks/{id}
async fn get_chunk(
    State(state): State<AppState>,
    Path(id): Path<EngramId>,
) -> ApiResult<Json<Chunk>> {
    Ok(Json(state.store.get_chunk(id)?))
}

/// PUT /api/v1/chunks/{id}
async fn update_chunk(
    State(state): State<AppState>,
    Path(id): Path<EngramId>,
    Json(update): Json<ChunkUpdate>,
) -> ApiResult<Json<Chunk>> {
    Ok(Json(state.store.update_chunk(id, update)?))
}

/// DELETE /api/v1/chunks/{id}
async fn delete_chunk(
    State(state): State<AppState>,
    Path(id): Path<EngramId>,
) -> ApiResult<StatusCode> {
    state.store.delete_chunk(id)?;
    Ok(StatusCode::NO_CONTENT)
}
