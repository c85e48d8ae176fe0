// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow run state.

use crate::artifact::ArtifactId;
use crate::project::ProjectId;
use crate::task::TaskId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    /// Unique identifier for one execution of a workflow definition.
    pub struct RunId("run-");
}

/// Status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
}

crate::simple_display! {
    RunStatus {
        Pending => "pending",
        Running => "running",
        Paused => "paused",
        Completed => "completed",
        Failed => "failed",
    }
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// One execution of a workflow definition for a project.
///
/// The engine is stateless between pause and resume: everything needed to
/// re-drive the run lives here — `current_step_index` and the
/// `context_snapshot` mapping each artifact type to the latest artifact id
/// merged in by a completed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: RunId,
    pub project_id: ProjectId,
    /// Name of the workflow definition this run executes
    pub definition_id: String,
    /// Content hash of the definition at start time (change detection)
    pub definition_hash: String,
    pub status: RunStatus,
    /// Index of the next step to execute. Monotonically non-decreasing.
    pub current_step_index: usize,
    /// Latest artifact id per artifact type, merged after each committed step
    #[serde(default)]
    pub context_snapshot: HashMap<String, ArtifactId>,
    /// Workflow-level retries consumed by the current step (distinct from
    /// the scheduler's per-task attempts)
    #[serde(default)]
    pub step_retries: u32,
    /// Tasks of the in-flight step: one entry for a sequential step,
    /// several for a parallel group
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub active_tasks: Vec<TaskId>,
    /// Why the run is paused, when it is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_reason: Option<String>,
    /// Structured error recorded on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl WorkflowRun {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Resolve the latest artifact id recorded for an artifact type.
    pub fn snapshot_artifact(&self, artifact_type: &str) -> Option<&ArtifactId> {
        self.context_snapshot.get(artifact_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(!RunStatus::Paused.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }
}
