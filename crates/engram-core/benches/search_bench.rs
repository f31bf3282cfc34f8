//! Search latency: exact flat scan vs. IVF probing.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use engram_core::index::{FlatIndex, IvfIndex, VectorIndex};
use engram_core::{EngramId, SimilarityMetric};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DIMENSION: usize = 64;

fn random_vectors(n: usize) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(5);
    (0..n)
        .map(|_| (0..DIMENSION).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect()
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_search");

    for &n in &[1_000usize, 5_000] {
        let vectors = random_vectors(n);
        let query = vectors[n / 2].clone();

        let mut flat = FlatIndex::new(SimilarityMetric::Cosine);
        let mut ivf = IvfIndex::new(SimilarityMetric::Cosine, Some(32), Some(4));
        for vector in &vectors {
            flat.add(EngramId::new(), vector.clone()).unwrap();
            ivf.add(EngramId::new(), vector.clone()).unwrap();
        }
        ivf.build().unwrap();

        group.bench_with_input(BenchmarkId::new("flat", n), &n, |b, _| {
            b.iter(|| flat.search(&query, 10).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("ivf", n), &n, |b, _| {
            b.iter(|| ivf.search(&query, 10).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
