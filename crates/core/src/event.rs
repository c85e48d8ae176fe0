// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types for the Shipwright system.
//!
//! Events are facts: everything the daemon persists, replays, and
//! broadcasts is an [`Event`] wrapped in an [`EventRecord`] envelope.
//! State is derived from events; see the storage crate's reducers.

use crate::agent::AgentKind;
use crate::artifact::{Artifact, ArtifactId};
use crate::hitl::{
    Approval, ApprovalAction, ApprovalId, CancelledBy, EmergencyStop, StopId, StopScope,
};
use crate::phase::Phase;
use crate::project::{Project, ProjectId};
use crate::run::{RunId, WorkflowRun};
use crate::task::{Task, TaskId};
use crate::timer::TimerId;
use serde::{Deserialize, Serialize};

/// Events that drive state transitions in the system.
///
/// Serializes with `{"type": "task.started", ...fields}` format.
/// Unknown type tags deserialize to `Custom`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- project --
    #[serde(rename = "project.created")]
    ProjectCreated { project: Project },

    // -- workflow --
    #[serde(rename = "workflow.started")]
    WorkflowStarted { run: WorkflowRun },

    #[serde(rename = "workflow.step_started")]
    WorkflowStepStarted {
        run_id: RunId,
        project_id: ProjectId,
        step_id: String,
        step_index: usize,
    },

    /// Step reached a committed end. `skipped` marks optional steps whose
    /// condition evaluated false.
    #[serde(rename = "workflow.step_completed")]
    WorkflowStepCompleted {
        run_id: RunId,
        project_id: ProjectId,
        step_id: String,
        step_index: usize,
        #[serde(default)]
        skipped: bool,
    },

    #[serde(rename = "workflow.phase_changed")]
    WorkflowPhaseChanged { run_id: RunId, project_id: ProjectId, phase: Phase },

    /// A failed step is being retried at the workflow level with a fresh
    /// task; `replaced_task` is the terminal task being superseded.
    #[serde(rename = "workflow.step_retried")]
    WorkflowStepRetried {
        run_id: RunId,
        project_id: ProjectId,
        step_id: String,
        retries: u32,
        replaced_task: TaskId,
    },

    #[serde(rename = "workflow.paused")]
    WorkflowPaused { run_id: RunId, project_id: ProjectId, reason: String },

    #[serde(rename = "workflow.resumed")]
    WorkflowResumed { run_id: RunId, project_id: ProjectId },

    #[serde(rename = "workflow.completed")]
    WorkflowCompleted { run_id: RunId, project_id: ProjectId },

    #[serde(rename = "workflow.failed")]
    WorkflowFailed { run_id: RunId, project_id: ProjectId, error: String },

    // -- task --
    #[serde(rename = "task.created")]
    TaskCreated { task: Task },

    #[serde(rename = "task.started")]
    TaskStarted { id: TaskId, project_id: ProjectId, attempt: u32 },

    /// Heartbeat from a working attempt. `error` is set when the previous
    /// attempt failed transiently and a retry is scheduled.
    #[serde(rename = "task.progress")]
    TaskProgress {
        id: TaskId,
        project_id: ProjectId,
        attempt: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "task.completed")]
    TaskCompleted {
        id: TaskId,
        project_id: ProjectId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<serde_json::Value>,
        #[serde(default)]
        artifact_ids: Vec<ArtifactId>,
    },

    #[serde(rename = "task.failed")]
    TaskFailed { id: TaskId, project_id: ProjectId, error: String },

    #[serde(rename = "task.cancelled")]
    TaskCancelled { id: TaskId, project_id: ProjectId, reason: String, by: CancelledBy },

    /// A working task missed its progress deadline. Indicator only.
    #[serde(rename = "task.stalled")]
    TaskStalled { id: TaskId, project_id: ProjectId, idle_ms: u64 },

    /// A caller asked for a task to be cancelled; the runtime decides
    /// whether that is immediate or a cooperative signal.
    #[serde(rename = "task.cancel_requested")]
    TaskCancelRequested { id: TaskId, project_id: ProjectId, reason: String, by: CancelledBy },

    /// Task returned to `pending` after an approval was granted;
    /// `added_context` carries any guidance artifact attached on modify.
    #[serde(rename = "task.resumed")]
    TaskResumed {
        id: TaskId,
        project_id: ProjectId,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        added_context: Vec<ArtifactId>,
    },

    // -- artifact --
    #[serde(rename = "artifact.created")]
    ArtifactCreated { artifact: Artifact },

    // -- hitl --
    #[serde(rename = "hitl.requested")]
    HitlRequested { approval: Approval },

    #[serde(rename = "hitl.responded")]
    HitlResponded {
        id: ApprovalId,
        project_id: ProjectId,
        action: ApprovalAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_text: Option<String>,
    },

    #[serde(rename = "hitl.expired")]
    HitlExpired { id: ApprovalId, project_id: ProjectId },

    #[serde(rename = "emergency_stop.activated")]
    EmergencyStopActivated { stop: EmergencyStop },

    #[serde(rename = "emergency_stop.deactivated")]
    EmergencyStopDeactivated { id: StopId },

    #[serde(rename = "counter.decremented")]
    CounterDecremented { project_id: ProjectId, remaining: u32 },

    #[serde(rename = "counter.exhausted")]
    CounterExhausted { project_id: ProjectId },

    #[serde(rename = "counter.refilled")]
    CounterRefilled { project_id: ProjectId, remaining: u32 },

    #[serde(rename = "counter.toggled")]
    CounterToggled { project_id: ProjectId, enabled: bool },

    #[serde(rename = "policy.violation")]
    PolicyViolation {
        project_id: ProjectId,
        task_id: TaskId,
        agent: AgentKind,
        rule: String,
    },

    // -- system --
    /// Internal: a scheduler timer fired. Not audited, not broadcast.
    #[serde(rename = "timer.fired")]
    TimerFired { id: TimerId },

    /// Internal: daemon shutdown request.
    #[serde(rename = "system.shutdown")]
    Shutdown,

    /// Catch-all for unknown event types (extensibility)
    #[serde(other, skip_serializing)]
    Custom,
}

impl Event {
    /// The stable wire kind (the serde tag).
    pub fn kind(&self) -> &'static str {
        match self {
            Event::ProjectCreated { .. } => "project.created",
            Event::WorkflowStarted { .. } => "workflow.started",
            Event::WorkflowStepStarted { .. } => "workflow.step_started",
            Event::WorkflowStepCompleted { .. } => "workflow.step_completed",
            Event::WorkflowPhaseChanged { .. } => "workflow.phase_changed",
            Event::WorkflowStepRetried { .. } => "workflow.step_retried",
            Event::WorkflowPaused { .. } => "workflow.paused",
            Event::WorkflowResumed { .. } => "workflow.resumed",
            Event::WorkflowCompleted { .. } => "workflow.completed",
            Event::WorkflowFailed { .. } => "workflow.failed",
            Event::TaskCreated { .. } => "task.created",
            Event::TaskStarted { .. } => "task.started",
            Event::TaskProgress { .. } => "task.progress",
            Event::TaskCompleted { .. } => "task.completed",
            Event::TaskFailed { .. } => "task.failed",
            Event::TaskCancelled { .. } => "task.cancelled",
            Event::TaskCancelRequested { .. } => "task.cancel_requested",
            Event::TaskStalled { .. } => "task.stalled",
            Event::TaskResumed { .. } => "task.resumed",
            Event::ArtifactCreated { .. } => "artifact.created",
            Event::HitlRequested { .. } => "hitl.requested",
            Event::HitlResponded { .. } => "hitl.responded",
            Event::HitlExpired { .. } => "hitl.expired",
            Event::EmergencyStopActivated { .. } => "emergency_stop.activated",
            Event::EmergencyStopDeactivated { .. } => "emergency_stop.deactivated",
            Event::CounterDecremented { .. } => "counter.decremented",
            Event::CounterExhausted { .. } => "counter.exhausted",
            Event::CounterRefilled { .. } => "counter.refilled",
            Event::CounterToggled { .. } => "counter.toggled",
            Event::PolicyViolation { .. } => "policy.violation",
            Event::TimerFired { .. } => "timer.fired",
            Event::Shutdown => "system.shutdown",
            Event::Custom => "custom",
        }
    }

    /// Project this event belongs to, when it is project-scoped.
    ///
    /// Control events and globally scoped emergency stops return `None`.
    pub fn project_id(&self) -> Option<ProjectId> {
        match self {
            Event::ProjectCreated { project } => Some(project.id),
            Event::WorkflowStarted { run } => Some(run.project_id),
            Event::WorkflowStepStarted { project_id, .. }
            | Event::WorkflowStepCompleted { project_id, .. }
            | Event::WorkflowPhaseChanged { project_id, .. }
            | Event::WorkflowPaused { project_id, .. }
            | Event::WorkflowResumed { project_id, .. }
            | Event::WorkflowCompleted { project_id, .. }
            | Event::WorkflowFailed { project_id, .. }
            | Event::WorkflowStepRetried { project_id, .. }
            | Event::TaskStarted { project_id, .. }
            | Event::TaskProgress { project_id, .. }
            | Event::TaskCompleted { project_id, .. }
            | Event::TaskFailed { project_id, .. }
            | Event::TaskCancelled { project_id, .. }
            | Event::TaskCancelRequested { project_id, .. }
            | Event::TaskStalled { project_id, .. }
            | Event::TaskResumed { project_id, .. }
            | Event::HitlResponded { project_id, .. }
            | Event::HitlExpired { project_id, .. }
            | Event::CounterDecremented { project_id, .. }
            | Event::CounterExhausted { project_id }
            | Event::CounterRefilled { project_id, .. }
            | Event::CounterToggled { project_id, .. }
            | Event::PolicyViolation { project_id, .. } => Some(*project_id),
            Event::TaskCreated { task } => Some(task.project_id),
            Event::ArtifactCreated { artifact } => Some(artifact.project_id),
            Event::HitlRequested { approval } => Some(approval.project_id),
            Event::EmergencyStopActivated { stop } => match stop.scope {
                StopScope::Project(id) => Some(id),
                StopScope::Global => None,
            },
            Event::EmergencyStopDeactivated { .. }
            | Event::TimerFired { .. }
            | Event::Shutdown
            | Event::Custom => None,
        }
    }

    /// Task this event concerns, when any. Used by audit-trail filtering.
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Event::TaskCreated { task } => Some(task.id),
            Event::TaskStarted { id, .. }
            | Event::TaskProgress { id, .. }
            | Event::TaskCompleted { id, .. }
            | Event::TaskFailed { id, .. }
            | Event::TaskCancelled { id, .. }
            | Event::TaskCancelRequested { id, .. }
            | Event::TaskStalled { id, .. }
            | Event::TaskResumed { id, .. } => Some(*id),
            Event::WorkflowStepRetried { replaced_task, .. } => Some(*replaced_task),
            Event::HitlRequested { approval } => approval.task_id,
            Event::PolicyViolation { task_id, .. } => Some(*task_id),
            _ => None,
        }
    }

    /// Whether this is an internal control event that is neither audited
    /// nor broadcast to subscribers.
    pub fn is_control(&self) -> bool {
        matches!(self, Event::TimerFired { .. } | Event::Shutdown | Event::Custom)
    }

    /// One-line summary for effect/execution logging.
    pub fn log_summary(&self) -> String {
        match self {
            Event::ProjectCreated { project } => format!("project.created {}", project.id),
            Event::WorkflowStarted { run } => format!("workflow.started {}", run.id),
            Event::TaskCreated { task } => format!("task.created {} {}", task.id, task.agent),
            Event::ArtifactCreated { artifact } => {
                format!("artifact.created {} {}", artifact.id, artifact.artifact_type)
            }
            Event::HitlRequested { approval } => {
                format!("hitl.requested {} {}", approval.id, approval.kind)
            }
            Event::TimerFired { id } => format!("timer.fired {id}"),
            other => match (other.kind(), other.task_id(), other.project_id()) {
                (kind, Some(task), _) => format!("{kind} {task}"),
                (kind, None, Some(project)) => format!("{kind} {project}"),
                (kind, None, None) => kind.to_string(),
            },
        }
    }
}

/// Persisted envelope for an [`Event`].
///
/// `seq` is the write-ahead-log sequence number and doubles as the public
/// event id: replay cursors, audit pagination, and per-project ordering
/// are all in terms of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    pub timestamp_ms: u64,
    pub event: Event,
}

impl EventRecord {
    /// Wrap an event, deriving its project scope. `seq` is assigned by the
    /// write-ahead log on append.
    pub fn new(seq: u64, timestamp_ms: u64, event: Event) -> Self {
        Self { seq, project_id: event.project_id(), timestamp_ms, event }
    }

    pub fn kind(&self) -> &'static str {
        self.event.kind()
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
