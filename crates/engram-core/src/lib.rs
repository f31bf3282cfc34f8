//! Engram: a lightweight in-memory vector database.
//!
//! The engine keeps a three-level hierarchy of collections: libraries own
//! documents, and documents own chunks. It answers k-nearest-neighbor
//! queries over per-library vector indexes with optional metadata filtering.
//!
//! # Architecture
//!
//! - **Entity store**: all tables plus the index registry behind a single
//!   reentrant lock; every public operation is atomic ([`store`]).
//! - **Index family**: an exact flat index and an approximate IVF index
//!   behind a common contract, built lazily on first search ([`index`]).
//! - **Query pipeline**: index top-k plus declarative or programmatic
//!   post-filtering with over-fetch ([`query`]).
//! - **Snapshot layer**: optional atomic JSON persistence with
//!   write-counter autosaving ([`snapshot`]).
//!
//! # Example
//!
//! ```
//! use engram_core::{
//!     CreateChunk, CreateDocument, CreateLibrary, EngineConfig, IndexKind, IndexOptions,
//!     Metadata, VectorStore,
//! };
//!
//! let store = VectorStore::new(EngineConfig::default());
//!
//! let library = store.create_library(CreateLibrary {
//!     name: "notes".to_string(),
//!     index_kind: IndexKind::Flat,
//!     index_options: IndexOptions::default(),
//!     metadata: Metadata::new(),
//! })?;
//! let document = store.create_document(
//!     library.id,
//!     CreateDocument { name: "intro".to_string(), metadata: Metadata::new() },
//! )?;
//! store.create_chunk(
//!     document.id,
//!     CreateChunk { text: "hello".to_string(), embedding: vec![1.0, 0.0], metadata: Metadata::new() },
//! )?;
//!
//! let response = store.query(library.id, &[1.0, 0.0], 1, None, None)?;
//! assert_eq!(response.results.len(), 1);
//! # Ok::<(), engram_core::EngramError>(())
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod id;
pub mod index;
pub mod metric;
pub mod query;
pub mod registry;
pub mod snapshot;
pub mod store;
pub mod types;

pub use config::{AUTOSAVE_DISABLED, EngineConfig, PersistenceConfig};
pub use error::{EngramError, Result};
pub use filter::{FilterCondition, FilterGroup, FilterNode, FilterOp, LogicalOp, SearchFilter};
pub use id::EngramId;
pub use index::{IndexHit, IndexKind, IndexOptions, IndexStats, VectorIndex};
pub use metric::SimilarityMetric;
pub use query::{MAX_K, QueryMatch, QueryResponse};
pub use snapshot::{SNAPSHOT_FILE, Snapshot, SnapshotStats};
pub use store::{
    BuildReport, ChunkUpdate, CreateChunk, CreateDocument, CreateLibrary, DocumentUpdate,
    LibraryUpdate, StoreStatus, VectorStore,
};
pub use types::{Chunk, Document, Library, Metadata, Vector};
