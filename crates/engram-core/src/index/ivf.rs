//! Inverted-file (IVF-flat) index with k-means clustered partitions.

use super::{IndexHit, IndexKind, VectorIndex, kmeans, take_top_k};
use crate::error::{EngramError, Result};
use crate::id::EngramId;
use crate::metric::SimilarityMetric;
use crate::types::Vector;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// Clusters probed per query when the caller does not say otherwise.
const DEFAULT_NPROBE: usize = 1;

/// Below this corpus size the default cluster count collapses to 1.
const SMALL_CORPUS: usize = 10;

/// Approximate index partitioning vectors into `nlist` clusters around
/// k-means centroids; a query only scans the `nprobe` closest partitions.
///
/// Full-fidelity vectors are kept in a flat map next to the cluster lists,
/// so deletes and rebuilds never lose precision. The index moves through
/// `Empty -> Pending -> Built`; adds, updates and deletes after a build are
/// applied incrementally without recomputing centroids, and an explicit
/// `build()` re-clusters from scratch.
pub struct IvfIndex {
    metric: SimilarityMetric,
    nlist: Option<usize>,
    nprobe: usize,
    dimension: Option<usize>,
    vectors: BTreeMap<EngramId, Vector>,
    centroids: Vec<Vector>,
    clusters: Vec<Vec<(EngramId, Vector)>>,
    built: bool,
}

impl IvfIndex {
    pub fn new(metric: SimilarityMetric, nlist: Option<usize>, nprobe: Option<usize>) -> Self {
        Self {
            metric,
            nlist,
            nprobe: nprobe.unwrap_or(DEFAULT_NPROBE),
            dimension: None,
            vectors: BTreeMap::new(),
            centroids: Vec::new(),
            clusters: Vec::new(),
            built: false,
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

    /// Cluster count actually used for a build over `n` vectors.
    fn effective_nlist(&self, n: usize) -> usize {
        let requested = match self.nlist {
            Some(nlist) => nlist,
            None if n < SMALL_CORPUS => 1,
            None => (n as f64).sqrt().floor() as usize,
        };
        requested.clamp(1, n)
    }

    /// Closest cluster for a vector by the configured metric; ties keep the
    /// lowest cluster index.
    fn nearest_cluster(&self, vector: &[f32]) -> usize {
        nearest(&self.centroids, self.metric, vector)
    }

    fn remove_from_clusters(&mut self, id: &EngramId) {
        for cluster in &mut self.clusters {
            if let Some(pos) = cluster.iter().position(|(member, _)| member == id) {
                cluster.remove(pos);
                return;
            }
        }
    }
}

fn nearest(centroids: &[Vector], metric: SimilarityMetric, vector: &[f32]) -> usize {
    let mut best = 0;
    let mut best_score = f32::NEG_INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let score = metric.score(vector, centroid);
        if score > best_score {
            best = i;
            best_score = score;
        }
    }
    best
}

impl VectorIndex for IvfIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Ivf
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
        self.built
    }

    fn add(&mut self, id: EngramId, vector: Vector) -> Result<()> {
        self.check_dimension(&vector)?;
        self.dimension.get_or_insert(vector.len());

        if self.built {
            if self.centroids.is_empty() {
                // a degenerate zero-vector build has no partitions to place
                // this vector into; fall back to pending for a real build
                self.built = false;
            } else {
                self.remove_from_clusters(&id);
                let cluster = self.nearest_cluster(&vector);
                self.clusters[cluster].push((id, vector.clone()));
            }
        }
        self.vectors.insert(id, vector);
        Ok(())
    }

    fn update(&mut self, id: EngramId, vector: Vector) -> Result<()> {
        if !self.vectors.contains_key(&id) {
            return Err(EngramError::not_found("vector", id));
        }
        self.check_dimension(&vector)?;
        self.delete(&id)?;
        self.add(id, vector)
    }

    fn delete(&mut self, id: &EngramId) -> Result<()> {
        if self.vectors.remove(id).is_none() {
            return Err(EngramError::not_found("vector", id));
        }
        if self.built {
            self.remove_from_clusters(id);
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.vectors.clear();
        self.centroids.clear();
        self.clusters.clear();
        self.dimension = None;
        self.built = false;
    }

    fn build(&mut self) -> Result<()> {
        let n = self.vectors.len();
        if n == 0 {
            self.centroids.clear();
            self.clusters.clear();
            self.built = true;
            return Ok(());
        }

        let nlist = self.effective_nlist(n);
        debug!(total_vectors = n, nlist, "clustering ivf index");

        let data: Vec<&[f32]> = self.vectors.values().map(|v| v.as_slice()).collect();
        let centroids = kmeans::cluster(&data, nlist);

        let mut clusters: Vec<Vec<(EngramId, Vector)>> = vec![Vec::new(); centroids.len()];
        for (id, vector) in &self.vectors {
            let cluster = nearest(&centroids, self.metric, vector);
            clusters[cluster].push((*id, vector.clone()));
        }

        self.centroids = centroids;
        self.clusters = clusters;
        self.built = true;
        Ok(())
    }

    fn search(&mut self, query: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        if !self.built {
            self.build()?;
        }
        if self.vectors.is_empty() {
            return Ok(Vec::new());
        }
        self.check_dimension(query)?;

        let nprobe = self.nprobe.min(self.centroids.len()).max(1);

        // rank non-empty partitions by centroid score, probe the best
        let mut ranked: Vec<(usize, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.clusters[*i].is_empty())
            .map(|(i, centroid)| (i, self.metric.score(query, centroid)))
            .collect();
        ranked.sort_unstable_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let mut hits = Vec::new();
        for (cluster, _) in ranked.into_iter().take(nprobe) {
            for (id, vector) in &self.clusters[cluster] {
                hits.push(IndexHit {
                    id: *id,
                    score: self.metric.score(query, vector),
                });
            }
        }
        Ok(take_top_k(hits, k))
    }
}
