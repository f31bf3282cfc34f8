//! Seeded Lloyd's k-means used by the IVF index build.

use crate::types::Vector;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};

/// Iteration cap for a single Lloyd run.
const MAX_ITERATIONS: usize = 300;

/// Number of random-seeded restarts; the lowest-inertia run wins.
const RESTARTS: usize = 10;

/// Base RNG seed. Fixed so repeated builds over the same data produce
/// identical centroids.
const SEED: u64 = 42;

/// Cluster `data` into `k` groups and return the centroids.
///
/// Requires `1 <= k <= data.len()` and a non-empty `data` set; the IVF
/// build clamps its cluster count before calling in.
pub(crate) fn cluster(data: &[&[f32]], k: usize) -> Vec<Vector> {
    debug_assert!(!data.is_empty());
    debug_assert!(k >= 1 && k <= data.len());

    let mut best: Option<(f64, Vec<Vector>)> = None;
    for restart in 0..RESTARTS {
        let mut rng = StdRng::seed_from_u64(SEED.wrapping_add(restart as u64));
        let (inertia, centroids) = lloyd(data, k, &mut rng);
        if best.as_ref().is_none_or(|(lowest, _)| inertia < *lowest) {
            best = Some((inertia, centroids));
        }
    }
    best.map(|(_, centroids)| centroids).unwrap_or_default()
}

/// One Lloyd run from a random initialization; returns (inertia, centroids).
fn lloyd(data: &[&[f32]], k: usize, rng: &mut StdRng) -> (f64, Vec<Vector>) {
    let n = data.len();
    let dim = data[0].len();

    // seed centroids from k distinct points
    let mut centroids: Vec<Vector> = sample(rng, n, k)
        .into_iter()
        .map(|i| data[i].to_vec())
        .collect();
    let mut assignments = vec![0usize; n];

    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (i, point) in data.iter().enumerate() {
            let nearest = nearest_centroid(&centroids, point);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }

        let mut sums = vec![vec![0.0f32; dim]; k];
        let mut counts = vec![0usize; k];
        for (i, point) in data.iter().enumerate() {
            let c = assignments[i];
            counts[c] += 1;
            for (sum, x) in sums[c].iter_mut().zip(point.iter()) {
                *sum += x;
            }
        }
        for c in 0..k {
            if counts[c] == 0 {
                // re-seed a starved cluster from a random point
                centroids[c] = data[rng.gen_range(0..n)].to_vec();
                changed = true;
            } else {
                centroids[c] = sums[c].iter().map(|sum| sum / counts[c] as f32).collect();
            }
        }

        if !changed {
            break;
        }
    }

    let inertia = data
        .iter()
        .enumerate()
        .map(|(i, point)| squared_distance(point, &centroids[assignments[i]]) as f64)
        .sum();
    (inertia, centroids)
}

/// Index of the closest centroid; ties keep the lowest index.
fn nearest_centroid(centroids: &[Vector], point: &[f32]) -> usize {
    let mut best = 0;
    let mut best_distance = f32::INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let distance = squared_distance(point, centroid);
        if distance < best_distance {
            best = i;
            best_distance = distance;
        }
    }
    best
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}
