// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact event handlers. Artifacts are append-only: inserts only,
//! never mutation or deletion while the project lives.

use sw_core::{Event, EventRecord};

use super::MaterializedState;

pub(crate) fn apply(state: &mut MaterializedState, record: &EventRecord) {
    if let Event::ArtifactCreated { artifact } = &record.event {
        if !state.artifacts.contains_key(artifact.id.as_str()) {
            state.artifacts.insert(artifact.id.as_str().to_string(), artifact.clone());
        }
    }
}
