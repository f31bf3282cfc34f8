//! Engine configuration.

use crate::snapshot::SNAPSHOT_FILE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sentinel that disables write-counter autosaving.
pub const AUTOSAVE_DISABLED: i64 = -1;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub persistence: PersistenceConfig,
}

impl EngineConfig {
    /// Configuration with the snapshot layer enabled on `snapshot_dir`.
    pub fn with_persistence(snapshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            persistence: PersistenceConfig {
                enabled: true,
                snapshot_dir: snapshot_dir.into(),
                ..PersistenceConfig::default()
            },
        }
    }

    /// Full path of the snapshot file inside the snapshot directory.
    pub fn snapshot_path(&self) -> PathBuf {
        self.persistence.snapshot_dir.join(SNAPSHOT_FILE)
    }
}

/// Snapshot persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Gates the whole snapshot layer; when false, save/restore/autosave
    /// report `Unavailable`.
    pub enabled: bool,

    /// Directory that receives atomic snapshot writes.
    pub snapshot_dir: PathBuf,

    /// Mutating operations between autosaves; `AUTOSAVE_DISABLED` turns
    /// autosaving off.
    pub autosave_threshold: i64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            snapshot_dir: PathBuf::from("./data"),
            autosave_threshold: AUTOSAVE_DISABLED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(!config.persistence.enabled);
        assert_eq!(config.persistence.autosave_threshold, AUTOSAVE_DISABLED);
        assert_eq!(config.snapshot_path(), PathBuf::from("./data/snapshot.json"));
    }

    #[test]
    fn test_with_persistence() {
        let config = EngineConfig::with_persistence("/tmp/engram");
        assert!(config.persistence.enabled);
        assert_eq!(config.persistence.snapshot_dir, PathBuf::from("/tmp/engram"));
    }
}
