//! Unique identifier type for engram entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A unique identifier for libraries, documents, and chunks.
///
/// Uses UUIDv4 for globally unique, collision-resistant IDs that stay
/// stable across restarts. Ids are totally ordered so that equal-score
/// search results can be ranked deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngramId(Uuid);

impl EngramId {
    /// Create a new random ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parse from a string
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for EngramId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EngramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EngramId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<EngramId> for Uuid {
    fn from(id: EngramId) -> Self {
        id.0
    }
}

impl std::str::FromStr for EngramId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_creation() {
        let id1 = EngramId::new();
        let id2 = EngramId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_id_parse_roundtrip() {
        let id = EngramId::new();
        let parsed = EngramId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_id_serde() {
        let id = EngramId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: EngramId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn test_id_ordering_is_total() {
        let mut ids: Vec<EngramId> = (0..8).map(|_| EngramId::new()).collect();
        ids.sort();
        for pair in ids.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }
}
