//! Thread-safe entity store: the single owner of all persisted state.
//!
//! Every table, the index registry, and the autosave counter live behind
//! one reentrant mutex; each public operation holds it for its full
//! duration, which is what makes the index implementations safe to keep
//! lock-free internally.

use crate::config::EngineConfig;
use crate::error::{EngramError, Result};
use crate::filter::SearchFilter;
use crate::id::EngramId;
use crate::index::{IndexKind, IndexOptions, IndexStats};
use crate::query::{self, QueryResponse};
use crate::registry::IndexRegistry;
use crate::snapshot::{self, Snapshot, SnapshotStats};
use crate::types::{Chunk, Document, Library, Metadata, Vector};
use chrono::Utc;
use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Parameters for creating a library.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLibrary {
    pub name: String,
    pub index_kind: IndexKind,
    #[serde(default)]
    pub index_options: IndexOptions,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Partial update of a library.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryUpdate {
    pub name: Option<String>,
    pub metadata: Option<Metadata>,
}

/// Parameters for creating a document.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDocument {
    pub name: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Partial update of a document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentUpdate {
    pub name: Option<String>,
    pub metadata: Option<Metadata>,
}

/// Parameters for creating a chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateChunk {
    pub text: String,
    pub embedding: Vector,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Partial update of a chunk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkUpdate {
    pub text: Option<String>,
    pub embedding: Option<Vector>,
    pub metadata: Option<Metadata>,
}

/// Returned from an explicit index rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub library_id: EngramId,
    pub total_vectors: usize,
    pub dimension: Option<usize>,
    pub kind: IndexKind,
    pub options: IndexOptions,
}

/// Store-wide status summary.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub libraries: usize,
    pub documents: usize,
    pub chunks: usize,
    pub indexes: HashMap<EngramId, IndexStats>,
    pub persistence_enabled: bool,
    pub autosave_threshold: i64,
    pub writes_since_save: u64,
}

pub(crate) struct StoreState {
    pub(crate) libraries: HashMap<EngramId, Library>,
    pub(crate) documents: HashMap<EngramId, Document>,
    pub(crate) chunks: HashMap<EngramId, Chunk>,
    pub(crate) registry: IndexRegistry,
    pub(crate) writes_since_save: u64,
}

impl StoreState {
    fn empty() -> Self {
        Self {
            libraries: HashMap::new(),
            documents: HashMap::new(),
            chunks: HashMap::new(),
            registry: IndexRegistry::new(),
            writes_since_save: 0,
        }
    }
}

/// The entity store.
///
/// Owns the library / document / chunk tables and the per-library index
/// registry. All mutations funnel through here; indexes only ever hold
/// copies of vectors keyed by chunk id, never entity state.
pub struct VectorStore {
    config: EngineConfig,
    state: ReentrantMutex<RefCell<StoreState>>,
}

impl VectorStore {
    /// Create an empty store.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: ReentrantMutex::new(RefCell::new(StoreState::empty())),
        }
    }

    /// Create a store, restoring the latest snapshot when persistence is
    /// enabled and one exists on disk.
    pub fn open(config: EngineConfig) -> Result<Self> {
        let store = Self::new(config);
        if store.config.persistence.enabled && store.config.snapshot_path().exists() {
            let stats = store.restore_snapshot()?;
            info!(
                libraries = stats.libraries,
                documents = stats.documents,
                chunks = stats.chunks,
                "restored snapshot on startup"
            );
        }
        Ok(store)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        let guard = self.state.lock();
        let state = guard.borrow();
        f(&state)
    }

    fn write<T>(&self, f: impl FnOnce(&mut StoreState) -> Result<T>) -> Result<T> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let out = f(&mut state)?;
        self.note_write(&mut state);
        Ok(out)
    }

    /// Bump the autosave counter and snapshot under the lock once the
    /// threshold is crossed. A failed autosave must not fail the write
    /// that triggered it.
    fn note_write(&self, state: &mut StoreState) {
        state.writes_since_save += 1;
        let threshold = self.config.persistence.autosave_threshold;
        if !self.config.persistence.enabled || threshold <= 0 {
            return;
        }
        if state.writes_since_save >= threshold as u64 {
            match self.write_snapshot_locked(state) {
                Ok(stats) => {
                    state.writes_since_save = 0;
                    info!(path = %stats.path.display(), "autosaved snapshot");
                }
                Err(e) => warn!(error = %e, "autosave failed"),
            }
        }
    }

    fn write_snapshot_locked(&self, state: &StoreState) -> Result<SnapshotStats> {
        let snapshot = Snapshot::new(
            state.libraries.values().cloned().collect(),
            state.documents.values().cloned().collect(),
            state.chunks.values().cloned().collect(),
        );
        let path = self.config.snapshot_path();
        snapshot::write(&path, &snapshot)?;
        Ok(SnapshotStats {
            libraries: snapshot.libraries.len(),
            documents: snapshot.documents.len(),
            chunks: snapshot.chunks.len(),
            path,
        })
    }

    fn ensure_persistence(&self) -> Result<()> {
        if self.config.persistence.enabled {
            Ok(())
        } else {
            Err(EngramError::Unavailable(
                "persistence is disabled".to_string(),
            ))
        }
    }

    // ------------------------------------------------------------------
    // Libraries
    // ------------------------------------------------------------------

    pub fn create_library(&self, req: CreateLibrary) -> Result<Library> {
        validate_name(&req.name)?;
        req.index_options.validate(req.index_kind)?;

        self.write(move |state| {
            let library = Library::new(req.name, req.index_kind, req.index_options, req.metadata);
            state
                .registry
                .register(library.id, library.index_kind, &library.index_options)?;
            info!(library_id = %library.id, kind = library.index_kind.as_str(), "created library");
            state.libraries.insert(library.id, library.clone());
            Ok(library)
        })
    }

    pub fn get_library(&self, id: EngramId) -> Result<Library> {
        self.read(|state| {
            state
                .libraries
                .get(&id)
                .cloned()
                .ok_or_else(|| EngramError::not_found("library", id))
        })
    }

    /// All libraries, oldest first.
    pub fn list_libraries(&self) -> Vec<Library> {
        self.read(|state| {
            let mut libraries: Vec<Library> = state.libraries.values().cloned().collect();
            libraries.sort_by_key(|library| (library.created_at, library.id));
            libraries
        })
    }

    pub fn update_library(&self, id: EngramId, update: LibraryUpdate) -> Result<Library> {
        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        self.write(move |state| {
            let library = state
                .libraries
                .get_mut(&id)
                .ok_or_else(|| EngramError::not_found("library", id))?;
            if let Some(name) = update.name {
                library.name = name;
            }
            if let Some(metadata) = update.metadata {
                library.metadata = metadata;
            }
            library.updated_at = Utc::now();
            Ok(library.clone())
        })
    }

    /// Delete a library together with all of its documents and chunks.
    pub fn delete_library(&self, id: EngramId) -> Result<()> {
        self.write(|state| {
            let library = state
                .libraries
                .remove(&id)
                .ok_or_else(|| EngramError::not_found("library", id))?;
            for document_id in &library.document_ids {
                if let Some(document) = state.documents.remove(document_id) {
                    for chunk_id in &document.chunk_ids {
                        state.chunks.remove(chunk_id);
                    }
                }
            }
            state.registry.unregister(&id);
            info!(library_id = %id, "deleted library");
            Ok(())
        })
    }

    /// Explicitly (re)build a library's index.
    pub fn rebuild_index(&self, library_id: EngramId) -> Result<BuildReport> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        let (kind, options) = state
            .libraries
            .get(&library_id)
            .map(|library| (library.index_kind, library.index_options.clone()))
            .ok_or_else(|| EngramError::not_found("library", library_id))?;

        let index = state.registry.index_mut(&library_id)?;
        index.build()?;
        let stats = index.stats();
        info!(library_id = %library_id, total_vectors = stats.total_vectors, "rebuilt index");

        Ok(BuildReport {
            library_id,
            total_vectors: stats.total_vectors,
            dimension: stats.dimension,
            kind,
            options,
        })
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    pub fn create_document(&self, library_id: EngramId, req: CreateDocument) -> Result<Document> {
        self.write(move |state| {
            let library = state
                .libraries
                .get_mut(&library_id)
                .ok_or_else(|| EngramError::not_found("library", library_id))?;
            let document = Document::new(library_id, req.name, req.metadata);
            library.document_ids.push(document.id);
            library.updated_at = Utc::now();
            debug!(document_id = %document.id, library_id = %library_id, "created document");
            state.documents.insert(document.id, document.clone());
            Ok(document)
        })
    }

    pub fn get_document(&self, id: EngramId) -> Result<Document> {
        self.read(|state| {
            state
                .documents
                .get(&id)
                .cloned()
                .ok_or_else(|| EngramError::not_found("document", id))
        })
    }

    /// Documents of a library, in insertion order.
    pub fn list_documents(&self, library_id: EngramId) -> Result<Vec<Document>> {
        self.read(|state| {
            let library = state
                .libraries
                .get(&library_id)
                .ok_or_else(|| EngramError::not_found("library", library_id))?;
            Ok(library
                .document_ids
                .iter()
                .filter_map(|id| state.documents.get(id).cloned())
                .collect())
        })
    }

    pub fn update_document(&self, id: EngramId, update: DocumentUpdate) -> Result<Document> {
        self.write(move |state| {
            let document = state
                .documents
                .get_mut(&id)
                .ok_or_else(|| EngramError::not_found("document", id))?;
            if let Some(name) = update.name {
                document.name = name;
            }
            if let Some(metadata) = update.metadata {
                document.metadata = metadata;
            }
            document.updated_at = Utc::now();
            Ok(document.clone())
        })
    }

    /// Delete a document together with all of its chunks.
    pub fn delete_document(&self, id: EngramId) -> Result<()> {
        self.write(|state| {
            let document = state
                .documents
                .remove(&id)
                .ok_or_else(|| EngramError::not_found("document", id))?;
            if let Some(library) = state.libraries.get_mut(&document.library_id) {
                library.document_ids.retain(|document_id| *document_id != id);
                library.updated_at = Utc::now();
            }
            let index = state.registry.index_mut(&document.library_id)?;
            for chunk_id in &document.chunk_ids {
                if state.chunks.remove(chunk_id).is_some() {
                    index.delete(chunk_id)?;
                }
            }
            debug!(document_id = %id, "deleted document");
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Chunks
    // ------------------------------------------------------------------

    pub fn create_chunk(&self, document_id: EngramId, req: CreateChunk) -> Result<Chunk> {
        self.write(move |state| {
            let library_id = state
                .documents
                .get(&document_id)
                .map(|document| document.library_id)
                .ok_or_else(|| EngramError::not_found("document", document_id))?;

            validate_embedding(&req.embedding)?;
            let index = state.registry.index_mut(&library_id)?;
            if let Some(expected) = index.dimension() {
                if req.embedding.len() != expected {
                    return Err(EngramError::DimensionMismatch {
                        expected,
                        got: req.embedding.len(),
                    });
                }
            }

            let chunk = Chunk::new(document_id, req.text, req.embedding, req.metadata);
            index.add(chunk.id, chunk.embedding.clone())?;

            let document = state
                .documents
                .get_mut(&document_id)
                .ok_or_else(|| EngramError::not_found("document", document_id))?;
            document.chunk_ids.push(chunk.id);
            document.updated_at = Utc::now();
            debug!(chunk_id = %chunk.id, document_id = %document_id, "created chunk");
            state.chunks.insert(chunk.id, chunk.clone());
            Ok(chunk)
        })
    }

    /// Create many chunks atomically: if any element fails validation, no
    /// chunk from the call is kept.
    pub fn bulk_create_chunks(
        &self,
        document_id: EngramId,
        reqs: Vec<CreateChunk>,
    ) -> Result<Vec<Chunk>> {
        self.write(move |state| {
            let library_id = state
                .documents
                .get(&document_id)
                .map(|document| document.library_id)
                .ok_or_else(|| EngramError::not_found("document", document_id))?;

            // validate every element before touching any state
            let mut expected = state.registry.index_mut(&library_id)?.dimension();
            for req in &reqs {
                validate_embedding(&req.embedding)?;
                match expected {
                    Some(dimension) if req.embedding.len() != dimension => {
                        return Err(EngramError::DimensionMismatch {
                            expected: dimension,
                            got: req.embedding.len(),
                        });
                    }
                    Some(_) => {}
                    None => expected = Some(req.embedding.len()),
                }
            }

            // store insertions first; the index is only updated after all
            // of them succeeded
            let mut created = Vec::with_capacity(reqs.len());
            for req in reqs {
                let chunk = Chunk::new(document_id, req.text, req.embedding, req.metadata);
                state.chunks.insert(chunk.id, chunk.clone());
                created.push(chunk);
            }

            let items: Vec<(EngramId, Vector)> = created
                .iter()
                .map(|chunk| (chunk.id, chunk.embedding.clone()))
                .collect();
            if let Err(e) = state.registry.index_mut(&library_id)?.bulk_add(items) {
                // undo this call's insertions: all-or-nothing
                for chunk in &created {
                    state.chunks.remove(&chunk.id);
                }
                return Err(e);
            }

            let document = state
                .documents
                .get_mut(&document_id)
                .ok_or_else(|| EngramError::not_found("document", document_id))?;
            for chunk in &created {
                document.chunk_ids.push(chunk.id);
            }
            document.updated_at = Utc::now();
            info!(document_id = %document_id, count = created.len(), "bulk-created chunks");
            Ok(created)
        })
    }

    pub fn get_chunk(&self, id: EngramId) -> Result<Chunk> {
        self.read(|state| {
            state
                .chunks
                .get(&id)
                .cloned()
                .ok_or_else(|| EngramError::not_found("chunk", id))
        })
    }

    /// Chunks of a document, in insertion order.
    pub fn list_chunks(&self, document_id: EngramId) -> Result<Vec<Chunk>> {
        self.read(|state| {
            let document = state
                .documents
                .get(&document_id)
                .ok_or_else(|| EngramError::not_found("document", document_id))?;
            Ok(document
                .chunk_ids
                .iter()
                .filter_map(|id| state.chunks.get(id).cloned())
                .collect())
        })
    }

    pub fn update_chunk(&self, id: EngramId, update: ChunkUpdate) -> Result<Chunk> {
        self.write(move |state| {
            let document_id = state
                .chunks
                .get(&id)
                .map(|chunk| chunk.document_id)
                .ok_or_else(|| EngramError::not_found("chunk", id))?;
            let library_id = state
                .documents
                .get(&document_id)
                .map(|document| document.library_id)
                .ok_or_else(|| {
                    EngramError::Internal(format!("chunk {id} has no parent document"))
                })?;

            if let Some(embedding) = &update.embedding {
                validate_embedding(embedding)?;
                let index = state.registry.index_mut(&library_id)?;
                if let Some(expected) = index.dimension() {
                    if embedding.len() != expected {
                        return Err(EngramError::DimensionMismatch {
                            expected,
                            got: embedding.len(),
                        });
                    }
                }
                // an embedding change is a delete + add at the index level
                index.update(id, embedding.clone())?;
            }

            let chunk = state
                .chunks
                .get_mut(&id)
                .ok_or_else(|| EngramError::not_found("chunk", id))?;
            if let Some(text) = update.text {
                chunk.text = text;
            }
            if let Some(embedding) = update.embedding {
                chunk.embedding = embedding;
            }
            if let Some(metadata) = update.metadata {
                chunk.metadata = metadata;
            }
            chunk.updated_at = Utc::now();
            Ok(chunk.clone())
        })
    }

    pub fn delete_chunk(&self, id: EngramId) -> Result<()> {
        self.write(|state| {
            let chunk = state
                .chunks
                .remove(&id)
                .ok_or_else(|| EngramError::not_found("chunk", id))?;
            let library_id = state
                .documents
                .get(&chunk.document_id)
                .map(|document| document.library_id);
            if let Some(document) = state.documents.get_mut(&chunk.document_id) {
                document.chunk_ids.retain(|chunk_id| *chunk_id != id);
                document.updated_at = Utc::now();
            }
            if let Some(library_id) = library_id {
                state.registry.index_mut(&library_id)?.delete(&id)?;
            }
            debug!(chunk_id = %id, "deleted chunk");
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Query
    // ------------------------------------------------------------------

    /// k-nearest-neighbor search over a library, with optional declarative
    /// filter or programmatic predicate (mutually exclusive).
    pub fn query(
        &self,
        library_id: EngramId,
        embedding: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
        predicate: Option<&dyn Fn(&Chunk) -> bool>,
    ) -> Result<QueryResponse> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        query::execute(&mut state, library_id, embedding, k, filter, predicate)
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Synchronously write a snapshot of all entity state.
    pub fn save_snapshot(&self) -> Result<SnapshotStats> {
        self.ensure_persistence()?;
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let stats = self.write_snapshot_locked(&state)?;
        state.writes_since_save = 0;
        info!(path = %stats.path.display(), chunks = stats.chunks, "saved snapshot");
        Ok(stats)
    }

    /// Replace all in-memory state with the latest snapshot. Destructive:
    /// anything not saved is lost.
    pub fn restore_snapshot(&self) -> Result<SnapshotStats> {
        self.ensure_persistence()?;
        let path = self.config.snapshot_path();
        let snapshot = snapshot::read(&path)?;

        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        *state = state_from_snapshot(snapshot)?;
        let stats = SnapshotStats {
            libraries: state.libraries.len(),
            documents: state.documents.len(),
            chunks: state.chunks.len(),
            path,
        };
        info!(chunks = stats.chunks, "restored snapshot");
        Ok(stats)
    }

    /// Drop every library, document, chunk, and index.
    pub fn clear(&self) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        *state = StoreState::empty();
        info!("cleared store");
    }

    pub fn status(&self) -> StoreStatus {
        self.read(|state| StoreStatus {
            libraries: state.libraries.len(),
            documents: state.documents.len(),
            chunks: state.chunks.len(),
            indexes: state.registry.all_stats(),
            persistence_enabled: self.config.persistence.enabled,
            autosave_threshold: self.config.persistence.autosave_threshold,
            writes_since_save: state.writes_since_save,
        })
    }
}

/// Rebuild store state from a snapshot document.
///
/// Indexes are recreated unbuilt and repopulated from the restored chunks;
/// the store, not the snapshot, is the source of truth for vectors.
fn state_from_snapshot(snapshot: Snapshot) -> Result<StoreState> {
    let mut state = StoreState::empty();

    for library in snapshot.libraries {
        library.index_options.validate(library.index_kind)?;
        state
            .registry
            .register(library.id, library.index_kind, &library.index_options)?;
        let id = library.id;
        if state.libraries.insert(id, library).is_some() {
            return Err(EngramError::Conflict(format!(
                "duplicate library id {id} in snapshot"
            )));
        }
    }
    for document in snapshot.documents {
        if !state.libraries.contains_key(&document.library_id) {
            return Err(EngramError::Internal(format!(
                "document {} references missing library {}",
                document.id, document.library_id
            )));
        }
        let id = document.id;
        if state.documents.insert(id, document).is_some() {
            return Err(EngramError::Conflict(format!(
                "duplicate document id {id} in snapshot"
            )));
        }
    }
    for chunk in snapshot.chunks {
        if !state.documents.contains_key(&chunk.document_id) {
            return Err(EngramError::Internal(format!(
                "chunk {} references missing document {}",
                chunk.id, chunk.document_id
            )));
        }
        let id = chunk.id;
        if state.chunks.insert(id, chunk).is_some() {
            return Err(EngramError::Conflict(format!(
                "duplicate chunk id {id} in snapshot"
            )));
        }
    }

    // repopulate each library's index in insertion order
    for library in state.libraries.values() {
        let mut items: Vec<(EngramId, Vector)> = Vec::new();
        for document_id in &library.document_ids {
            let document = state.documents.get(document_id).ok_or_else(|| {
                EngramError::Internal(format!(
                    "library {} lists missing document {document_id}",
                    library.id
                ))
            })?;
            for chunk_id in &document.chunk_ids {
                let chunk = state.chunks.get(chunk_id).ok_or_else(|| {
                    EngramError::Internal(format!(
                        "document {document_id} lists missing chunk {chunk_id}"
                    ))
                })?;
                items.push((chunk.id, chunk.embedding.clone()));
            }
        }
        state.registry.index_mut(&library.id)?.bulk_add(items)?;
    }

    Ok(state)
}

fn validate_name(name: &str) -> Result<()> {
    let length = name.chars().count();
    if length == 0 || length > 255 {
        return Err(EngramError::InvalidArgument(
            "name must be between 1 and 255 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_embedding(embedding: &[f32]) -> Result<()> {
    if embedding.is_empty() {
        return Err(EngramError::InvalidArgument(
            "embedding must not be empty".to_string(),
        ));
    }
    Ok(())
}
