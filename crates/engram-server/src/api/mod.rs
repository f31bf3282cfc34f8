//! REST API surface over the engram store.

pub mod error;
pub mod routes;

use axum::Router;
use engram_core::VectorStore;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<VectorStore>,
}

/// Assemble the full API router.
pub fn router(store: Arc<VectorStore>) -> Router {
    let state = AppState { store };
    Router::new()
        .merge(routes::libraries::routes())
        .merge(routes::documents::routes())
        .merge(routes::chunks::routes())
        .merge(routes::query::routes())
        .merge(routes::admin::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
