//! Entity model: the library / document / chunk hierarchy.

use crate::id::EngramId;
use crate::index::{IndexKind, IndexOptions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A vector embedding.
pub type Vector = Vec<f32>;

/// Arbitrary JSON-valued metadata attached to an entity.
pub type Metadata = HashMap<String, serde_json::Value>;

/// A logical collection of documents, searched through one vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Library {
    pub id: EngramId,
    pub name: String,
    pub index_kind: IndexKind,
    pub index_options: IndexOptions,
    pub metadata: Metadata,
    /// Owned documents, in insertion order.
    pub document_ids: Vec<EngramId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Library {
    pub fn new(
        name: String,
        index_kind: IndexKind,
        index_options: IndexOptions,
        metadata: Metadata,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EngramId::new(),
            name,
            index_kind,
            index_options,
            metadata,
            document_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A group of chunks inside a library.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: EngramId,
    pub library_id: EngramId,
    pub name: String,
    pub metadata: Metadata,
    /// Owned chunks, in insertion order.
    pub chunk_ids: Vec<EngramId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(library_id: EngramId, name: String, metadata: Metadata) -> Self {
        let now = Utc::now();
        Self {
            id: EngramId::new(),
            library_id,
            name,
            metadata,
            chunk_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// The searchable unit: a piece of text with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: EngramId,
    pub document_id: EngramId,
    pub text: String,
    pub embedding: Vector,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chunk {
    pub fn new(document_id: EngramId, text: String, embedding: Vector, metadata: Metadata) -> Self {
        let now = Utc::now();
        Self {
            id: EngramId::new(),
            document_id,
            text,
            embedding,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_starts_empty() {
        let library = Library::new(
            "notes".to_string(),
            IndexKind::Flat,
            IndexOptions::default(),
            Metadata::new(),
        );
        assert!(library.document_ids.is_empty());
        assert_eq!(library.created_at, library.updated_at);
    }

    #[test]
    fn test_chunk_serde_roundtrip() {
        let mut metadata = Metadata::new();
        metadata.insert("category".to_string(), serde_json::json!("a"));
        let chunk = Chunk::new(EngramId::new(), "hello".to_string(), vec![0.5, 0.25], metadata);

        let json = serde_json::to_string(&chunk).unwrap();
        let back: Chunk = serde_json::from_str(&json).unwrap();
        assert_eq!(chunk, back);
    }
}
