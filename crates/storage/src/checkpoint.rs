// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot checkpointing.
//!
//! A checkpoint writes the zstd-compressed snapshot to a temp file and
//! renames it into place, so a crash mid-write never destroys the
//! previous snapshot.

use crate::snapshot::{rotate_bak_path, Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
use crate::state::MaterializedState;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// zstd level: snapshots are written often, favor speed over ratio.
const COMPRESSION_LEVEL: i32 = 3;

/// Outcome of a successful checkpoint.
#[derive(Debug, Clone, Copy)]
pub struct CheckpointResult {
    /// WAL sequence the snapshot covers
    pub seq: u64,
    /// Compressed size on disk
    pub size_bytes: u64,
}

/// Writes snapshots atomically to a fixed path.
pub struct Checkpointer {
    path: PathBuf,
}

impl Checkpointer {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Serialize, compress, and atomically install a snapshot at `seq`.
    pub fn checkpoint_sync(
        &self,
        seq: u64,
        state: &MaterializedState,
    ) -> Result<CheckpointResult, SnapshotError> {
        let snapshot = Snapshot::new(seq, state.clone());
        let json = serde_json::to_vec(&snapshot)?;
        let compressed = zstd::encode_all(json.as_slice(), COMPRESSION_LEVEL)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        {
            let mut f = File::create(&tmp)?;
            f.write_all(&compressed)?;
            f.sync_data()?;
        }
        std::fs::rename(&tmp, &self.path)?;

        Ok(CheckpointResult { seq, size_bytes: compressed.len() as u64 })
    }
}

/// Load a snapshot if one exists.
///
/// An unreadable snapshot is quarantined to `.bak` and treated as absent:
/// recovery falls back to full WAL replay rather than refusing to start.
/// A snapshot from a newer schema version is an error — downgrades are
/// not supported.
pub fn load_snapshot(path: &Path) -> Result<Option<Snapshot>, SnapshotError> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut compressed = Vec::new();
    file.read_to_end(&mut compressed)?;

    let snapshot: Snapshot = match zstd::decode_all(compressed.as_slice())
        .map_err(SnapshotError::from)
        .and_then(|json| serde_json::from_slice(&json).map_err(SnapshotError::from))
    {
        Ok(s) => s,
        Err(e) => {
            let bak = rotate_bak_path(path);
            tracing::warn!(
                path = %path.display(),
                bak = %bak.display(),
                error = %e,
                "unreadable snapshot quarantined, recovering from WAL"
            );
            std::fs::rename(path, &bak)?;
            return Ok(None);
        }
    };

    if snapshot.version > CURRENT_SNAPSHOT_VERSION {
        return Err(SnapshotError::VersionTooNew {
            found: snapshot.version,
            supported: CURRENT_SNAPSHOT_VERSION,
        });
    }

    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn checkpoint_then_load_roundtrips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.zst");

        let mut state = MaterializedState::default();
        state.apply_record(&sw_core::EventRecord::new(
            1,
            1_000,
            sw_core::test_support::project_created_event("prj-a", "Todo App"),
        ));

        let checkpointer = Checkpointer::new(path.clone());
        let result = checkpointer.checkpoint_sync(1, &state).unwrap();
        assert_eq!(result.seq, 1);
        assert!(result.size_bytes > 0);

        let snapshot = load_snapshot(&path).unwrap().unwrap();
        assert_eq!(snapshot.seq, 1);
        assert_eq!(snapshot.version, CURRENT_SNAPSHOT_VERSION);
        assert!(snapshot.state.projects.contains_key("prj-a"));
    }

    #[test]
    fn load_missing_snapshot_is_none() {
        let dir = tempdir().unwrap();
        assert!(load_snapshot(&dir.path().join("nope.zst")).unwrap().is_none());
    }

    #[test]
    fn corrupt_snapshot_is_quarantined() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.zst");
        std::fs::write(&path, b"definitely not zstd").unwrap();

        assert!(load_snapshot(&path).unwrap().is_none());
        assert!(path.with_extension("bak").exists());
        assert!(!path.exists());
    }
}
