//! Per-library index registry.

use crate::error::{EngramError, Result};
use crate::id::EngramId;
use crate::index::{self, IndexKind, IndexOptions, IndexStats, VectorIndex};
use std::collections::HashMap;
use tracing::debug;

/// Binds one index instance to each library.
///
/// Indexes are created unbuilt and built lazily by the first search, or by
/// an explicit rebuild.
#[derive(Default)]
pub struct IndexRegistry {
    indexes: HashMap<EngramId, Box<dyn VectorIndex>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register an unbuilt index for a library.
    pub fn register(
        &mut self,
        library_id: EngramId,
        kind: IndexKind,
        options: &IndexOptions,
    ) -> Result<()> {
        let index = index::create_index(kind, options)?;
        debug!(library_id = %library_id, kind = kind.as_str(), "registered index");
        self.indexes.insert(library_id, index);
        Ok(())
    }

    pub fn unregister(&mut self, library_id: &EngramId) {
        self.indexes.remove(library_id);
    }

    /// Mutable handle to a library's index.
    ///
    /// A registered library always has an index; a miss here means the
    /// store and registry have diverged.
    pub fn index_mut(&mut self, library_id: &EngramId) -> Result<&mut dyn VectorIndex> {
        if self.indexes.contains_key(library_id) {
            Ok(self
                .indexes
                .get_mut(library_id)
                .map(|index| index.as_mut())
                .expect("checked above"))
        } else {
            Err(EngramError::Internal(format!(
                "no index registered for library {library_id}"
            )))
        }
    }

    pub fn stats(&self, library_id: &EngramId) -> Option<IndexStats> {
        self.indexes.get(library_id).map(|index| index.stats())
    }

    pub fn all_stats(&self) -> HashMap<EngramId, IndexStats> {
        self.indexes
            .iter()
            .map(|(id, index)| (*id, index.stats()))
            .collect()
    }

    pub fn clear(&mut self) {
        self.indexes.clear();
    }
}
