//! Exhaustive exact-scan index.

use super::{IndexHit, IndexKind, VectorIndex, take_top_k};
use crate::error::{EngramError, Result};
use crate::id::EngramId;
use crate::metric::SimilarityMetric;
use crate::types::Vector;
use std::collections::BTreeMap;

/// Exact index: stores every vector and scans all of them per query.
///
/// There is no separate build step; a flat index is always effectively
/// built. Search is O(n * d) with exact recall.
pub struct FlatIndex {
    metric: SimilarityMetric,
    dimension: Option<usize>,
    vectors: BTreeMap<EngramId, Vector>,
}

impl FlatIndex {
    pub fn new(metric: SimilarityMetric) -> Self {
        Self {
            metric,
            dimension: None,
            vectors: BTreeMap::new(),
        }
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        match self.dimension {
            Some(expected) if vector.len() != expected => Err(EngramError::DimensionMismatch {
                expected,
                got: vector.len(),
            }),
            _ => Ok(()),
        }
    }
}

impl VectorIndex for FlatIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Flat
    }

    fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn is_built(&self) -> bool {
        true
    }

    fn add(&mut self, id: EngramId, vector: Vector) -> Result<()> {
        self.check_dimension(&vector)?;
        self.dimension.get_or_insert(vector.len());
        self.vectors.insert(id, vector);
        Ok(())
    }

    fn update(&mut self, id: EngramId, vector: Vector) -> Result<()> {
        if !self.vectors.contains_key(&id) {
            return Err(EngramError::not_found("vector", id));
        }
        self.check_dimension(&vector)?;
        self.vectors.insert(id, vector);
        Ok(())
    }

    fn delete(&mut self, id: &EngramId) -> Result<()> {
        self.vectors
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| EngramError::not_found("vector", id))
    }

    fn clear(&mut self) {
        self.vectors.clear();
        self.dimension = None;
    }

    fn build(&mut self) -> Result<()> {
        Ok(())
    }

    fn search(&mut self, query: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        if self.vectors.is_empty() {
            return Ok(Vec::new());
        }
        self.check_dimension(query)?;

        let hits = self
            .vectors
            .iter()
            .map(|(id, vector)| IndexHit {
                id: *id,
                score: self.metric.score(query, vector),
            })
            .collect();
        Ok(take_top_k(hits, k))
    }
}
