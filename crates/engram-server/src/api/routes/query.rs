//! k-nearest-neighbor query endpoint.

use crate::api::AppState;
use crate::api::error::ApiResult;
use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use engram_core::{EngramId, FilterGroup, QueryResponse, SearchFilter};
use serde::Deserialize;
use std::collections::HashSet;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/v1/libraries/{id}/query", post(query_library))
}

fn default_k() -> usize {
    10
}

#[derive(Debug, Deserialize)]
struct QueryPayload {
    embedding: Vec<f32>,

    #[serde(default = "default_k")]
    k: usize,

    /// Metadata predicate tree: `{operator, filters: [...]}`.
    #[serde(default)]
    filter: Option<FilterGroup>,

    #[serde(default)]
    created_after: Option<DateTime<Utc>>,

    #[serde(default)]
    created_before: Option<DateTime<Utc>>,

    #[serde(default)]
    document_ids: Option<HashSet<EngramId>>,
}

/// POST /api/v1/libraries/{id}/query
async fn query_library(
    State(state): State<AppState>,
    Path(library_id): Path<EngramId>,
    Json(payload): Json<QueryPayload>,
) -> ApiResult<Json<QueryResponse>> {
    let filter = SearchFilter {
        metadata: payload.filter,
        created_after: payload.created_after,
        created_before: payload.created_before,
        document_ids: payload.document_ids,
    };
    let filter = if filter.is_empty() { None } else { Some(filter) };

    let response = state.store.query(
        library_id,
        &payload.embedding,
        payload.k,
        filter.as_ref(),
        None,
    )?;
    Ok(Json(response))
}
