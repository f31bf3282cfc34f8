//! Document endpoints.

use crate::api::AppState;
use crate::api::error::ApiResult;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use engram_core::{CreateDocument, Document, DocumentUpdate, EngramId};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/libraries/{id}/documents",
            get(list_documents).post(create_document),
        )
        .route(
            "/api/v1/documents/{id}",
            get(get_document).put(update_document).delete(delete_document),
        )
}

/// POST /api/v1/libraries/{id}/documents
async fn create_document(
    State(state): State<AppState>,
    Path(library_id): Path<EngramId>,
    Json(payload): Json<CreateDocument>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let document = state.store.create_document(library_id, payload)?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// GET /api/v1/libraries/{id}/documents
async fn list_documents(
    State(state): State<AppState>,
    Path(library_id): Path<EngramId>,
) -> ApiResult<Json<Vec<Document>>> {
    Ok(Json(state.store.list_documents(library_id)?))
}

/// GET /api/v1/documents/{id}
async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<EngramId>,
) -> ApiResult<Json<Document>> {
    Ok(Json(state.store.get_document(id)?))
}

/// PUT /api/v1/documents/{id}
async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<EngramId>,
    Json(update): Json<DocumentUpdate>,
) -> ApiResult<Json<Document>> {
    Ok(Json(state.store.update_document(id, update)?))
}

/// DELETE /api/v1/documents/{id}
async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<EngramId>,
) -> ApiResult<StatusCode> {
    state.store.delete_document(id)?;
    Ok(StatusCode::NO_CONTENT)
}
