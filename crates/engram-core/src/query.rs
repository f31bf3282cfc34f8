//! k-nearest-neighbor query pipeline.

use crate::error::{EngramError, Result};
use crate::filter::SearchFilter;
use crate::id::EngramId;
use crate::store::StoreState;
use crate::types::Chunk;
use serde::Serialize;
use std::time::Instant;
use tracing::debug;

/// Upper bound on `k` accepted by the pipeline.
pub const MAX_K: usize = 1000;

/// Over-fetch multiplier applied when a filter or predicate is present, so
/// that post-filtering still tends to leave `k` matches.
const FILTER_OVERFETCH: usize = 3;

/// One ranked match.
#[derive(Debug, Clone, Serialize)]
pub struct QueryMatch {
    pub chunk: Chunk,
    pub score: f32,
}

/// Ranked result list with timing.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub results: Vec<QueryMatch>,
    pub total: usize,
    pub took_ms: u64,
}

pub(crate) fn execute(
    state: &mut StoreState,
    library_id: EngramId,
    embedding: &[f32],
    k: usize,
    filter: Option<&SearchFilter>,
    predicate: Option<&dyn Fn(&Chunk) -> bool>,
) -> Result<QueryResponse> {
    let start = Instant::now();

    if !state.libraries.contains_key(&library_id) {
        return Err(EngramError::not_found("library", library_id));
    }
    if k == 0 || k > MAX_K {
        return Err(EngramError::InvalidArgument(format!(
            "k must be between 1 and {MAX_K}"
        )));
    }
    if filter.is_some() && predicate.is_some() {
        return Err(EngramError::InvalidArgument(
            "a declarative filter and a programmatic predicate are mutually exclusive".to_string(),
        ));
    }

    let index = state.registry.index_mut(&library_id)?;
    let Some(expected) = index.dimension() else {
        // nothing was ever inserted, so no dimension to validate against
        return Ok(QueryResponse {
            results: Vec::new(),
            total: 0,
            took_ms: elapsed_ms(start),
        });
    };
    if embedding.len() != expected {
        return Err(EngramError::DimensionMismatch {
            expected,
            got: embedding.len(),
        });
    }

    let filtered = filter.is_some_and(|f| !f.is_empty()) || predicate.is_some();
    let fetch_k = if filtered {
        k.saturating_mul(FILTER_OVERFETCH)
    } else {
        k
    };
    let candidates = index.search(embedding, fetch_k)?;

    let mut results = Vec::with_capacity(k.min(candidates.len()));
    for hit in candidates {
        // A candidate may have been deleted between the index search and
        // this lookup; skip it rather than fail the query.
        let Some(chunk) = state.chunks.get(&hit.id) else {
            continue;
        };
        if let Some(filter) = filter {
            if !filter.matches(chunk) {
                continue;
            }
        }
        if let Some(predicate) = predicate {
            if !predicate(chunk) {
                continue;
            }
        }
        results.push(QueryMatch {
            chunk: chunk.clone(),
            score: hit.score,
        });
        if results.len() == k {
            break;
        }
    }

    let total = results.len();
    debug!(library_id = %library_id, k, total, "query executed");
    Ok(QueryResponse {
        results,
        total,
        took_ms: elapsed_ms(start),
    })
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
