//! Atomic snapshot persistence for the entity store.

use crate::error::{EngramError, Result};
use crate::types::{Chunk, Document, Library};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Format version written into every snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

/// File name of the snapshot inside the snapshot directory.
pub const SNAPSHOT_FILE: &str = "snapshot.json";

/// Self-describing snapshot document.
///
/// Index internals are not persisted; each library carries its index kind
/// and options, and indexes are rebuilt on demand after a restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub libraries: Vec<Library>,
    pub documents: Vec<Document>,
    pub chunks: Vec<Chunk>,
}

impl Snapshot {
    pub fn new(
        mut libraries: Vec<Library>,
        mut documents: Vec<Document>,
        mut chunks: Vec<Chunk>,
    ) -> Self {
        // stable on-disk ordering
        libraries.sort_by_key(|library| library.id);
        documents.sort_by_key(|document| document.id);
        chunks.sort_by_key(|chunk| chunk.id);
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            libraries,
            documents,
            chunks,
        }
    }
}

/// Statistics returned by save and restore operations.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotStats {
    pub libraries: usize,
    pub documents: usize,
    pub chunks: usize,
    pub path: PathBuf,
}

/// Write `snapshot` to `path` atomically: serialize into a sibling temp
/// file, fsync, then rename over the target. A reader never observes a
/// partial document.
pub fn write(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let dir = path.parent().ok_or_else(|| {
        EngramError::InvalidArgument(format!(
            "snapshot path {} has no parent directory",
            path.display()
        ))
    })?;
    fs::create_dir_all(dir)?;

    let payload = serde_json::to_vec_pretty(snapshot)?;
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&payload)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;

    debug!(path = %path.display(), bytes = payload.len(), "wrote snapshot");
    Ok(())
}

/// Read a snapshot back; `NotFound` when no file exists at `path`.
pub fn read(path: &Path) -> Result<Snapshot> {
    if !path.exists() {
        return Err(EngramError::NotFound(format!(
            "no snapshot at {}",
            path.display()
        )));
    }
    let bytes = fs::read(path)?;
    let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(EngramError::InvalidArgument(format!(
            "unsupported snapshot version {}",
            snapshot.version
        )));
    }
    Ok(snapshot)
}
