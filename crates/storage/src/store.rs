// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Context Store: the typed artifact repository.
//!
//! A thin facade over the WAL and materialized state. Writes append an
//! `artifact.created` event and flush before acknowledging, so a write
//! that returned is durable; reads come straight from state, which gives
//! read-your-writes within a project.

use crate::state::MaterializedState;
use crate::wal::{Wal, WalError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use sw_core::{
    AgentKind, Artifact, ArtifactId, ArtifactMeta, ArtifactSummary, Clock, Event, ProjectId,
};
use thiserror::Error;

/// Errors from Context Store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed write: missing identity fields or failed schema check.
    /// Fatal to the caller; never retried.
    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("artifact not found: {0}")]
    NotFound(String),

    /// Backend trouble; callers retry with backoff.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<WalError> for StoreError {
    fn from(e: WalError) -> Self {
        StoreError::StorageUnavailable(e.to_string())
    }
}

/// Per-type content checks: the set of top-level fields an artifact's
/// content object must carry. Types without a registration accept any
/// content.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    required: HashMap<String, Vec<String>>,
}

impl SchemaRegistry {
    pub fn register(&mut self, artifact_type: impl Into<String>, fields: Vec<String>) {
        self.required.insert(artifact_type.into(), fields);
    }

    /// Check content against the registered schema, if any.
    pub fn check(&self, artifact_type: &str, content: &serde_json::Value) -> Result<(), String> {
        let Some(fields) = self.required.get(artifact_type) else {
            return Ok(());
        };
        let Some(object) = content.as_object() else {
            return Err(format!("content for {artifact_type} must be an object"));
        };
        for field in fields {
            if !object.contains_key(field) {
                return Err(format!("content for {artifact_type} missing field {field}"));
            }
        }
        Ok(())
    }
}

/// A write request: everything an [`Artifact`] carries except the
/// store-assigned id and timestamp.
#[derive(Debug, Clone)]
pub struct ArtifactDraft {
    pub project_id: ProjectId,
    pub source_agent: AgentKind,
    pub artifact_type: String,
    pub content: serde_json::Value,
    pub metadata: ArtifactMeta,
}

/// Read-side filter for [`ContextStore::query`].
#[derive(Debug, Clone, Default)]
pub struct ArtifactFilter {
    pub artifact_type: Option<String>,
    pub source_agent: Option<AgentKind>,
}

/// Durable, append-only repository of typed artifacts.
pub struct ContextStore<C: Clock> {
    wal: Arc<Mutex<Wal>>,
    state: Arc<Mutex<MaterializedState>>,
    schemas: SchemaRegistry,
    clock: C,
}

impl<C: Clock> ContextStore<C> {
    pub fn new(
        wal: Arc<Mutex<Wal>>,
        state: Arc<Mutex<MaterializedState>>,
        schemas: SchemaRegistry,
        clock: C,
    ) -> Self {
        Self { wal, state, schemas, clock }
    }

    /// Write a new artifact. Durable before return; the id is fresh.
    pub fn put(&self, draft: ArtifactDraft) -> Result<ArtifactId, StoreError> {
        if draft.project_id.is_empty() {
            return Err(StoreError::InvalidArtifact("project_id is required".into()));
        }
        if draft.artifact_type.is_empty() {
            return Err(StoreError::InvalidArtifact("artifact_type is required".into()));
        }
        self.schemas
            .check(&draft.artifact_type, &draft.content)
            .map_err(StoreError::InvalidArtifact)?;

        let artifact = Artifact {
            id: ArtifactId::new(),
            project_id: draft.project_id,
            source_agent: draft.source_agent,
            artifact_type: draft.artifact_type,
            content: draft.content,
            metadata: draft.metadata,
            created_at_ms: self.clock.epoch_ms(),
        };
        let id = artifact.id;

        // Commit before ack: append + flush, then make it visible
        let record = {
            let mut wal = self.wal.lock();
            let record = wal.append(artifact.created_at_ms, Event::ArtifactCreated { artifact })?;
            wal.flush()?;
            record
        };
        self.state.lock().apply_record(&record);

        Ok(id)
    }

    /// Retrieve one artifact.
    pub fn get(&self, id: &ArtifactId) -> Result<Artifact, StoreError> {
        self.state
            .lock()
            .artifacts
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Retrieve artifacts in the order requested, skipping unknown ids.
    /// Callers detect gaps by comparing lengths.
    pub fn get_many(&self, ids: &[ArtifactId]) -> Vec<Artifact> {
        let state = self.state.lock();
        ids.iter().filter_map(|id| state.artifacts.get(id.as_str()).cloned()).collect()
    }

    /// Artifacts in a project matching the filter, by `created_at` ascending.
    pub fn query(&self, project_id: &ProjectId, filter: &ArtifactFilter) -> Vec<Artifact> {
        let state = self.state.lock();
        let mut artifacts: Vec<Artifact> = state
            .artifacts
            .values()
            .filter(|a| {
                a.project_id == *project_id
                    && filter.artifact_type.as_deref().is_none_or(|t| a.artifact_type == t)
                    && filter.source_agent.is_none_or(|s| a.source_agent == s)
            })
            .cloned()
            .collect();
        artifacts.sort_by_key(|a| (a.created_at_ms, a.id.as_str().to_string()));
        artifacts
    }

    /// Metadata-only listing for a project (no content).
    pub fn list_for_project(&self, project_id: &ProjectId) -> Vec<ArtifactSummary> {
        self.query(project_id, &ArtifactFilter::default())
            .iter()
            .map(Artifact::summary)
            .collect()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
