//! Vector index family: the common contract and its implementations.

pub mod flat;
pub mod ivf;
mod kmeans;

pub use flat::FlatIndex;
pub use ivf::IvfIndex;

use crate::error::{EngramError, Result};
use crate::id::EngramId;
use crate::metric::SimilarityMetric;
use crate::types::Vector;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Kind of index backing a library.
///
/// `hnsw` is reserved for a future graph-based implementation and is not an
/// accepted kind in this version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Flat,
    Ivf,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Ivf => "ivf",
        }
    }
}

impl std::str::FromStr for IndexKind {
    type Err = EngramError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "flat" => Ok(Self::Flat),
            "ivf" => Ok(Self::Ivf),
            "hnsw" => Err(EngramError::InvalidArgument(
                "index kind 'hnsw' is reserved but not available".to_string(),
            )),
            other => Err(EngramError::InvalidArgument(format!(
                "unknown index kind '{other}'"
            ))),
        }
    }
}

/// Per-library index configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexOptions {
    pub metric: SimilarityMetric,

    /// Number of IVF clusters; defaults to `floor(sqrt(n))` at build time.
    pub nlist: Option<usize>,

    /// Number of IVF clusters probed per query; defaults to 1.
    pub nprobe: Option<usize>,
}

impl IndexOptions {
    /// Check the option shape against the index kind.
    pub fn validate(&self, kind: IndexKind) -> Result<()> {
        match kind {
            IndexKind::Flat => {
                if self.nlist.is_some() || self.nprobe.is_some() {
                    return Err(EngramError::InvalidArgument(
                        "flat index accepts no clustering options".to_string(),
                    ));
                }
            }
            IndexKind::Ivf => {
                if self.nlist == Some(0) {
                    return Err(EngramError::InvalidArgument(
                        "nlist must be positive".to_string(),
                    ));
                }
                if self.nprobe == Some(0) {
                    return Err(EngramError::InvalidArgument(
                        "nprobe must be positive".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// A single candidate returned by an index search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHit {
    pub id: EngramId,
    pub score: f32,
}

/// Index statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub kind: IndexKind,
    pub metric: SimilarityMetric,
    pub total_vectors: usize,
    pub dimension: Option<usize>,
    pub built: bool,
}

/// Common contract for per-library vector indexes.
///
/// Implementations are not thread-safe on their own; the entity store
/// serializes all access behind its lock.
pub trait VectorIndex: Send {
    fn kind(&self) -> IndexKind;

    fn metric(&self) -> SimilarityMetric;

    /// Dimension fixed by the first inserted vector, if any.
    fn dimension(&self) -> Option<usize>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_built(&self) -> bool;

    /// Insert a vector. The first insert fixes the index dimension.
    fn add(&mut self, id: EngramId, vector: Vector) -> Result<()>;

    /// Insert many vectors; clustering work may be deferred to the next
    /// build.
    fn bulk_add(&mut self, items: Vec<(EngramId, Vector)>) -> Result<()> {
        for (id, vector) in items {
            self.add(id, vector)?;
        }
        Ok(())
    }

    /// Replace the vector stored under `id`. Delete-then-add semantics.
    fn update(&mut self, id: EngramId, vector: Vector) -> Result<()>;

    fn delete(&mut self, id: &EngramId) -> Result<()>;

    /// Drop all vectors and return to the unbuilt state.
    fn clear(&mut self);

    /// Explicitly (re)build the index structure.
    fn build(&mut self) -> Result<()>;

    /// Top-k candidates by the configured metric, score-descending, ties
    /// broken by ascending id. Builds lazily when required.
    fn search(&mut self, query: &[f32], k: usize) -> Result<Vec<IndexHit>>;

    fn stats(&self) -> IndexStats {
        IndexStats {
            kind: self.kind(),
            metric: self.metric(),
            total_vectors: self.len(),
            dimension: self.dimension(),
            built: self.is_built(),
        }
    }
}

/// Instantiate an unbuilt index of the requested kind.
pub fn create_index(kind: IndexKind, options: &IndexOptions) -> Result<Box<dyn VectorIndex>> {
    options.validate(kind)?;
    Ok(match kind {
        IndexKind::Flat => Box::new(FlatIndex::new(options.metric)),
        IndexKind::Ivf => Box::new(IvfIndex::new(options.metric, options.nlist, options.nprobe)),
    })
}

/// Order candidates score-descending with ascending-id tie-break, keep `k`.
pub(crate) fn take_top_k(mut hits: Vec<IndexHit>, k: usize) -> Vec<IndexHit> {
    hits.sort_unstable_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("flat".parse::<IndexKind>().unwrap(), IndexKind::Flat);
        assert_eq!("ivf".parse::<IndexKind>().unwrap(), IndexKind::Ivf);
        assert!(matches!(
            "hnsw".parse::<IndexKind>(),
            Err(EngramError::InvalidArgument(_))
        ));
        assert!(matches!(
            "annoy".parse::<IndexKind>(),
            Err(EngramError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_options_validation() {
        let flat_extra = IndexOptions {
            nlist: Some(4),
            ..IndexOptions::default()
        };
        assert!(flat_extra.validate(IndexKind::Flat).is_err());
        assert!(flat_extra.validate(IndexKind::Ivf).is_ok());

        let zero_nlist = IndexOptions {
            nlist: Some(0),
            ..IndexOptions::default()
        };
        assert!(zero_nlist.validate(IndexKind::Ivf).is_err());

        let zero_nprobe = IndexOptions {
            nprobe: Some(0),
            ..IndexOptions::default()
        };
        assert!(zero_nprobe.validate(IndexKind::Ivf).is_err());
    }

    #[test]
    fn test_options_reject_unknown_keys() {
        let result: std::result::Result<IndexOptions, _> =
            serde_json::from_str(r#"{"metric":"cosine","ef_construction":200}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_take_top_k_orders_and_truncates() {
        let ids: Vec<EngramId> = {
            let mut ids: Vec<EngramId> = (0..3).map(|_| EngramId::new()).collect();
            ids.sort();
            ids
        };
        let hits = vec![
            IndexHit { id: ids[2], score: 0.5 },
            IndexHit { id: ids[0], score: 0.5 },
            IndexHit { id: ids[1], score: 0.9 },
        ];
        let top = take_top_k(hits, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].id, ids[1]);
        // equal scores rank by ascending id
        assert_eq!(top[1].id, ids[0]);
    }
}
