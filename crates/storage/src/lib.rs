// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sw-storage: Durability layer for Shipwright.
//!
//! Everything the daemon knows is derived from the write-ahead log:
//! events append to the [`Wal`], reducers fold them into
//! [`MaterializedState`], and the [`Checkpointer`] snapshots that state so
//! restarts replay only the WAL tail. The [`ContextStore`] is the typed
//! artifact surface over the same machinery.

mod checkpoint;
mod snapshot;
mod state;
mod store;
mod wal;

pub use checkpoint::{load_snapshot, CheckpointResult, Checkpointer};
pub use snapshot::{Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use state::{AuditPage, AuditQuery, MaterializedState};
pub use store::{ArtifactDraft, ArtifactFilter, ContextStore, SchemaRegistry, StoreError};
pub use wal::{Wal, WalError};
