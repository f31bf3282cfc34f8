//! End-to-end tests over the public store surface.

use engram_core::{
    Chunk, CreateChunk, CreateDocument, CreateLibrary, EngineConfig, EngramError, EngramId,
    FilterCondition, FilterGroup, FilterNode, FilterOp, IndexKind, IndexOptions, LogicalOp,
    Metadata, SearchFilter, SimilarityMetric, VectorStore,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::sync::Arc;
use tempfile::tempdir;

fn create_library(store: &VectorStore, kind: IndexKind, options: IndexOptions) -> EngramId {
    store
        .create_library(CreateLibrary {
            name: "library".to_string(),
            index_kind: kind,
            index_options: options,
            metadata: Metadata::new(),
        })
        .unwrap()
        .id
}

fn create_document(store: &VectorStore, library_id: EngramId, name: &str) -> EngramId {
    store
        .create_document(
            library_id,
            CreateDocument {
                name: name.to_string(),
                metadata: Metadata::new(),
            },
        )
        .unwrap()
        .id
}

fn create_chunk(store: &VectorStore, document_id: EngramId, embedding: Vec<f32>) -> EngramId {
    store
        .create_chunk(
            document_id,
            CreateChunk {
                text: "chunk".to_string(),
                embedding,
                metadata: Metadata::new(),
            },
        )
        .unwrap()
        .id
}

#[test]
fn test_flat_exact_search() {
    let store = VectorStore::new(EngineConfig::default());
    let library_id = create_library(&store, IndexKind::Flat, IndexOptions::default());
    let document_id = create_document(&store, library_id, "doc");

    let c1 = create_chunk(&store, document_id, vec![1.0, 0.0, 0.0]);
    let c2 = create_chunk(&store, document_id, vec![1.0, 0.1, 0.0]);
    create_chunk(&store, document_id, vec![0.0, 1.0, 0.0]);
    create_chunk(&store, document_id, vec![0.0, 0.0, 1.0]);

    let response = store.query(library_id, &[1.0, 0.0, 0.0], 2, None, None).unwrap();
    assert_eq!(response.total, 2);
    assert_eq!(response.results[0].chunk.id, c1);
    assert_eq!(response.results[1].chunk.id, c2);
    assert!(response.results[0].score >= response.results[1].score);
}

#[test]
fn test_ivf_lazy_build_on_query() {
    let store = VectorStore::new(EngineConfig::default());
    let library_id = create_library(
        &store,
        IndexKind::Ivf,
        IndexOptions {
            nlist: Some(2),
            nprobe: Some(1),
            ..IndexOptions::default()
        },
    );
    let document_id = create_document(&store, library_id, "doc");

    let c1 = create_chunk(&store, document_id, vec![1.0, 0.0, 0.0]);
    let c2 = create_chunk(&store, document_id, vec![1.0, 0.1, 0.0]);
    create_chunk(&store, document_id, vec![0.0, 1.0, 0.0]);
    create_chunk(&store, document_id, vec![0.0, 0.0, 1.0]);

    let status = store.status();
    assert!(!status.indexes[&library_id].built);

    // no explicit build: the first query clusters the index
    let response = store.query(library_id, &[1.0, 0.0, 0.0], 2, None, None).unwrap();
    assert!(response.results.len() <= 2);
    for result in &response.results {
        assert!(result.chunk.id == c1 || result.chunk.id == c2);
    }
    assert!(store.status().indexes[&library_id].built);
}

#[test]
fn test_post_filter_with_over_fetch() {
    let store = VectorStore::new(EngineConfig::default());
    let library_id = create_library(
        &store,
        IndexKind::Flat,
        IndexOptions {
            metric: SimilarityMetric::Euclidean,
            ..IndexOptions::default()
        },
    );
    let document_id = create_document(&store, library_id, "doc");

    for i in 0..30 {
        let mut metadata = Metadata::new();
        metadata.insert("category".to_string(), json!(["a", "b", "c"][i % 3]));
        store
            .create_chunk(
                document_id,
                CreateChunk {
                    text: format!("chunk {i}"),
                    embedding: vec![i as f32, 0.0],
                    metadata,
                },
            )
            .unwrap();
    }

    let filter = SearchFilter {
        metadata: Some(FilterGroup {
            operator: LogicalOp::And,
            filters: vec![FilterNode::Condition(FilterCondition {
                field: "category".to_string(),
                op: FilterOp::Eq,
                value: json!("a"),
            })],
        }),
        ..SearchFilter::default()
    };
    let response = store
        .query(library_id, &[0.0, 0.0], 5, Some(&filter), None)
        .unwrap();

    assert_eq!(response.results.len(), 5);
    for result in &response.results {
        assert_eq!(result.chunk.metadata.get("category"), Some(&json!("a")));
    }
    // ranked by similarity: category "a" lives at i = 0, 3, 6, 9, 12
    let scores: Vec<f32> = response.results.iter().map(|r| r.score).collect();
    for pair in scores.windows(2) {
        assert!(pair[0] >= pair[1]);
    }
}

#[test]
fn test_bulk_add_rollback() {
    let store = VectorStore::new(EngineConfig::default());
    let library_id = create_library(&store, IndexKind::Flat, IndexOptions::default());
    let document_id = create_document(&store, library_id, "doc");
    create_chunk(&store, document_id, vec![0.0; 4]);

    let before = store.status().chunks;
    let mut reqs: Vec<CreateChunk> = (0..10)
        .map(|i| CreateChunk {
            text: format!("bulk {i}"),
            embedding: vec![i as f32; 4],
            metadata: Metadata::new(),
        })
        .collect();
    reqs[6].embedding = vec![1.0, 2.0];

    let err = store.bulk_create_chunks(document_id, reqs).unwrap_err();
    assert!(matches!(err, EngramError::DimensionMismatch { .. }));
    assert_eq!(store.status().chunks, before);
}

#[test]
fn test_snapshot_roundtrip_preserves_search_results() {
    let dir = tempdir().unwrap();
    let config = EngineConfig::with_persistence(dir.path());
    let store = VectorStore::new(config.clone());

    let library_id = create_library(&store, IndexKind::Flat, IndexOptions::default());
    let document_id = create_document(&store, library_id, "doc");

    let mut rng = StdRng::seed_from_u64(17);
    for _ in 0..100 {
        let embedding: Vec<f32> = (0..8).map(|_| rng.gen_range(-1.0..1.0)).collect();
        create_chunk(&store, document_id, embedding);
    }

    let query: Vec<f32> = (0..8).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let before: Vec<EngramId> = store
        .query(library_id, &query, 10, None, None)
        .unwrap()
        .results
        .iter()
        .map(|r| r.chunk.id)
        .collect();

    store.save_snapshot().unwrap();
    store.clear();
    assert_eq!(store.status().chunks, 0);

    let stats = store.restore_snapshot().unwrap();
    assert_eq!(stats.chunks, 100);
    assert_eq!(store.status().indexes[&library_id].total_vectors, 100);

    let after: Vec<EngramId> = store
        .query(library_id, &query, 10, None, None)
        .unwrap()
        .results
        .iter()
        .map(|r| r.chunk.id)
        .collect();
    assert_eq!(before, after);
}

#[test]
fn test_restore_on_open() {
    let dir = tempdir().unwrap();
    let config = EngineConfig::with_persistence(dir.path());

    let library_id = {
        let store = VectorStore::new(config.clone());
        let library_id = create_library(&store, IndexKind::Flat, IndexOptions::default());
        let document_id = create_document(&store, library_id, "doc");
        create_chunk(&store, document_id, vec![1.0, 0.0]);
        store.save_snapshot().unwrap();
        library_id
    };

    let reopened = VectorStore::open(config).unwrap();
    assert_eq!(reopened.status().chunks, 1);
    let response = reopened.query(library_id, &[1.0, 0.0], 1, None, None).unwrap();
    assert_eq!(response.results.len(), 1);
}

#[test]
fn test_cascading_library_delete() {
    let store = VectorStore::new(EngineConfig::default());
    let library_id = create_library(&store, IndexKind::Flat, IndexOptions::default());

    let mut document_ids = Vec::new();
    let mut chunk_ids = Vec::new();
    for d in 0..2 {
        let document_id = create_document(&store, library_id, &format!("doc {d}"));
        document_ids.push(document_id);
        for c in 0..3 {
            chunk_ids.push(create_chunk(&store, document_id, vec![d as f32, c as f32]));
        }
    }

    store.delete_library(library_id).unwrap();

    for document_id in document_ids {
        assert!(matches!(
            store.get_document(document_id),
            Err(EngramError::NotFound(_))
        ));
    }
    for chunk_id in chunk_ids {
        assert!(matches!(
            store.get_chunk(chunk_id),
            Err(EngramError::NotFound(_))
        ));
    }
    let status = store.status();
    assert_eq!(status.libraries, 0);
    assert_eq!(status.documents, 0);
    assert_eq!(status.chunks, 0);
}

#[test]
fn test_ivf_index_contains_every_chunk_after_build() {
    let store = VectorStore::new(EngineConfig::default());
    let library_id = create_library(
        &store,
        IndexKind::Ivf,
        IndexOptions {
            metric: SimilarityMetric::Euclidean,
            nlist: Some(4),
            nprobe: Some(4),
            ..IndexOptions::default()
        },
    );
    let document_id = create_document(&store, library_id, "doc");

    let mut expected: Vec<EngramId> = (0..20)
        .map(|i| create_chunk(&store, document_id, vec![i as f32, (i % 5) as f32]))
        .collect();
    let report = store.rebuild_index(library_id).unwrap();
    assert_eq!(report.total_vectors, 20);

    // probing every partition with k = n must return the full corpus
    let response = store
        .query(library_id, &[0.0, 0.0], 20, None, None)
        .unwrap();
    let mut returned: Vec<EngramId> = response.results.iter().map(|r| r.chunk.id).collect();
    expected.sort();
    returned.sort();
    assert_eq!(returned, expected);
}

#[test]
fn test_programmatic_predicate_query() {
    let store = VectorStore::new(EngineConfig::default());
    let library_id = create_library(
        &store,
        IndexKind::Flat,
        IndexOptions {
            metric: SimilarityMetric::Euclidean,
            ..IndexOptions::default()
        },
    );
    let document_id = create_document(&store, library_id, "doc");
    for i in 0..12 {
        store
            .create_chunk(
                document_id,
                CreateChunk {
                    text: if i % 2 == 0 { "keep" } else { "drop" }.to_string(),
                    embedding: vec![i as f32],
                    metadata: Metadata::new(),
                },
            )
            .unwrap();
    }

    let keep = |chunk: &Chunk| chunk.text == "keep";
    let response = store
        .query(library_id, &[0.0], 4, None, Some(&keep))
        .unwrap();
    assert_eq!(response.results.len(), 4);
    assert!(response.results.iter().all(|r| r.chunk.text == "keep"));
}

#[test]
fn test_concurrent_writes_and_queries() {
    let store = Arc::new(VectorStore::new(EngineConfig::default()));
    let library_id = create_library(
        &store,
        IndexKind::Flat,
        IndexOptions {
            metric: SimilarityMetric::Euclidean,
            ..IndexOptions::default()
        },
    );

    let mut document_ids = Vec::new();
    for d in 0..4 {
        document_ids.push(create_document(&store, library_id, &format!("doc {d}")));
    }

    std::thread::scope(|scope| {
        for (d, document_id) in document_ids.iter().enumerate() {
            let store = Arc::clone(&store);
            let document_id = *document_id;
            scope.spawn(move || {
                for i in 0..25 {
                    store
                        .create_chunk(
                            document_id,
                            CreateChunk {
                                text: format!("chunk {d}/{i}"),
                                embedding: vec![d as f32, i as f32],
                                metadata: Metadata::new(),
                            },
                        )
                        .unwrap();
                }
            });
        }
        for _ in 0..2 {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                for _ in 0..50 {
                    // queries interleave with writes; they must never fail
                    let response = store.query(library_id, &[1.0, 1.0], 5, None, None).unwrap();
                    assert!(response.results.len() <= 5);
                }
            });
        }
    });

    let status = store.status();
    assert_eq!(status.chunks, 100);
    assert_eq!(status.indexes[&library_id].total_vectors, 100);
    for document_id in document_ids {
        assert_eq!(store.get_document(document_id).unwrap().chunk_ids.len(), 25);
    }
}

#[test]
fn test_build_then_build_is_idempotent() {
    let store = VectorStore::new(EngineConfig::default());
    let library_id = create_library(
        &store,
        IndexKind::Ivf,
        IndexOptions {
            metric: SimilarityMetric::Euclidean,
            nlist: Some(3),
            nprobe: Some(2),
            ..IndexOptions::default()
        },
    );
    let document_id = create_document(&store, library_id, "doc");

    let mut rng = StdRng::seed_from_u64(29);
    for _ in 0..45 {
        let embedding: Vec<f32> = (0..4).map(|_| rng.gen_range(-1.0..1.0)).collect();
        create_chunk(&store, document_id, embedding);
    }

    let query: Vec<f32> = (0..4).map(|_| rng.gen_range(-1.0..1.0)).collect();
    store.rebuild_index(library_id).unwrap();
    let first: Vec<EngramId> = store
        .query(library_id, &query, 8, None, None)
        .unwrap()
        .results
        .iter()
        .map(|r| r.chunk.id)
        .collect();
    store.rebuild_index(library_id).unwrap();
    let second: Vec<EngramId> = store
        .query(library_id, &query, 8, None, None)
        .unwrap()
        .results
        .iter()
        .map(|r| r.chunk.id)
        .collect();
    assert_eq!(first, second);
}
