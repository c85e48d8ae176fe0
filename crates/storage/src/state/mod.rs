// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay

mod artifacts;
mod audit;
mod helpers;
mod hitl;
mod projects;
mod runs;
mod tasks;

pub use audit::{AuditPage, AuditQuery};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use sw_core::{
    Approval, Artifact, EmergencyStop, Event, EventRecord, HitlCounter, Project, ProjectId, Task,
    WorkflowRun,
};

/// Materialized state built from WAL replay.
///
/// Events are facts about what happened; state is derived from those
/// facts. Maps are keyed by id string so prefix lookup works uniformly.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub projects: HashMap<String, Project>,
    pub runs: HashMap<String, WorkflowRun>,
    pub tasks: HashMap<String, Task>,
    pub artifacts: HashMap<String, Artifact>,
    pub approvals: HashMap<String, Approval>,
    /// Auto-approval counters, keyed by project id
    #[serde(default)]
    pub counters: HashMap<String, HitlCounter>,
    /// Emergency stops, keyed by stop id. Deactivated stops are kept for audit.
    #[serde(default)]
    pub stops: HashMap<String, EmergencyStop>,
    /// Append-only audit trail of non-control events, in seq order
    #[serde(default)]
    pub audit: Vec<EventRecord>,
}

impl MaterializedState {
    /// Get a project by ID or unique prefix (like git commit hashes)
    pub fn get_project(&self, id: &str) -> Option<&Project> {
        helpers::find_by_prefix(&self.projects, id)
    }

    /// Get a task by ID or unique prefix
    pub fn get_task(&self, id: &str) -> Option<&Task> {
        helpers::find_by_prefix(&self.tasks, id)
    }

    /// Get an artifact by ID or unique prefix
    pub fn get_artifact(&self, id: &str) -> Option<&Artifact> {
        helpers::find_by_prefix(&self.artifacts, id)
    }

    /// Get an approval by ID or unique prefix
    pub fn get_approval(&self, id: &str) -> Option<&Approval> {
        helpers::find_by_prefix(&self.approvals, id)
    }

    /// The workflow run owned by a project, if any.
    pub fn run_for_project(&self, project_id: &ProjectId) -> Option<&WorkflowRun> {
        self.runs.values().find(|r| r.project_id == *project_id)
    }

    /// Tasks belonging to a project, ordered by creation time.
    pub fn tasks_for_project(&self, project_id: &ProjectId) -> Vec<&Task> {
        let mut tasks: Vec<&Task> =
            self.tasks.values().filter(|t| t.project_id == *project_id).collect();
        tasks.sort_by_key(|t| (t.created_at_ms, t.id.as_str().to_string()));
        tasks
    }

    /// The newest artifact of a type within a project.
    pub fn latest_artifact(&self, project_id: &ProjectId, artifact_type: &str) -> Option<&Artifact> {
        self.artifacts
            .values()
            .filter(|a| a.project_id == *project_id && a.artifact_type == artifact_type)
            .max_by_key(|a| (a.created_at_ms, a.id.as_str().to_string()))
    }

    /// The pending approval for a task, if one exists.
    ///
    /// At most one can exist; the reducer refuses to create a second.
    pub fn pending_approval_for_task(&self, task_id: &str) -> Option<&Approval> {
        self.approvals
            .values()
            .find(|a| a.task_id.is_some_and(|t| t == task_id) && a.is_pending())
    }

    /// Pending approvals within a project, oldest first.
    pub fn pending_approvals(&self, project_id: &ProjectId) -> Vec<&Approval> {
        let mut pending: Vec<&Approval> = self
            .approvals
            .values()
            .filter(|a| a.project_id == *project_id && a.is_pending())
            .collect();
        pending.sort_by_key(|a| (a.created_at_ms, a.id.as_str().to_string()));
        pending
    }

    /// An active emergency stop covering the project, if any.
    pub fn active_stop_for(&self, project_id: &ProjectId) -> Option<&EmergencyStop> {
        self.stops.values().find(|s| s.active && s.scope.covers(project_id))
    }

    /// The project's auto-approval counter (default: disabled, empty).
    pub fn counter(&self, project_id: &ProjectId) -> HitlCounter {
        self.counters.get(project_id.as_str()).copied().unwrap_or_default()
    }

    /// Apply a persisted event record to derive state changes.
    ///
    /// # Idempotency Requirement
    ///
    /// **All event handlers MUST be idempotent.** Applying the same record
    /// twice must produce the same state as applying it once, because
    /// records are applied both at emit time (for immediate visibility)
    /// and again when the engine loop drains the WAL.
    ///
    /// Guidelines for idempotent handlers:
    /// - Use assignment (`=`) instead of mutation (`+=`, `-=`)
    /// - Guard inserts with existence checks (`if !map.contains_key(...)`)
    /// - Guard task transitions with `TaskStatus::can_transition_to`
    pub fn apply_record(&mut self, record: &EventRecord) {
        match &record.event {
            // Projects and phase tracking
            Event::ProjectCreated { .. } | Event::WorkflowPhaseChanged { .. } => {
                projects::apply(self, record)
            }

            // Workflow runs
            Event::WorkflowStarted { .. }
            | Event::WorkflowStepStarted { .. }
            | Event::WorkflowStepCompleted { .. }
            | Event::WorkflowStepRetried { .. }
            | Event::WorkflowPaused { .. }
            | Event::WorkflowResumed { .. }
            | Event::WorkflowCompleted { .. }
            | Event::WorkflowFailed { .. } => runs::apply(self, record),

            // Tasks
            Event::TaskCreated { .. }
            | Event::TaskStarted { .. }
            | Event::TaskProgress { .. }
            | Event::TaskCompleted { .. }
            | Event::TaskFailed { .. }
            | Event::TaskCancelled { .. }
            | Event::TaskResumed { .. } => tasks::apply(self, record),

            // Artifacts
            Event::ArtifactCreated { .. } => artifacts::apply(self, record),

            // Approvals, counters, and emergency stops
            Event::HitlRequested { .. }
            | Event::HitlResponded { .. }
            | Event::HitlExpired { .. }
            | Event::EmergencyStopActivated { .. }
            | Event::EmergencyStopDeactivated { .. }
            | Event::CounterDecremented { .. }
            | Event::CounterExhausted { .. }
            | Event::CounterRefilled { .. }
            | Event::CounterToggled { .. } => hitl::apply(self, record),

            // Events that don't affect entity state
            // (indicators and runtime-routed control events)
            Event::TaskStalled { .. }
            | Event::TaskCancelRequested { .. }
            | Event::PolicyViolation { .. }
            | Event::TimerFired { .. }
            | Event::Shutdown
            | Event::Custom => {}
        }

        audit::append(self, record);
    }
}

#[cfg(test)]
#[path = "../state_tests/mod.rs"]
mod tests;
