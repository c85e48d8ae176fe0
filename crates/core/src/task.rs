// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task identifier and state machine.

use crate::agent::AgentKind;
use crate::artifact::ArtifactId;
use crate::project::ProjectId;
use crate::run::RunId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a unit of agent work executing one workflow step.
    pub struct TaskId("tsk-");
}

/// Status of a task.
///
/// Transitions are monotonic along two allowed paths:
/// `pending → working → {completed, failed, cancelled}` and
/// `pending → working → waiting_for_hitl → working → {completed, failed, cancelled}`.
/// Additionally a task may move to `waiting_for_hitl` or `cancelled`
/// straight from `pending` (gate consultation happens before dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Working,
    WaitingForHitl,
    Completed,
    Failed,
    Cancelled,
}

crate::simple_display! {
    TaskStatus {
        Pending => "pending",
        Working => "working",
        WaitingForHitl => "waiting_for_hitl",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }

    /// Whether `self → next` is a legal edge in the task state machine.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match (self, next) {
            (Pending, Working) | (Pending, WaitingForHitl) | (Pending, Cancelled) => true,
            (Working, Completed) | (Working, Failed) | (Working, Cancelled) => true,
            (Working, WaitingForHitl) => true,
            (WaitingForHitl, Working) | (WaitingForHitl, Pending) => true,
            (WaitingForHitl, Cancelled) | (WaitingForHitl, Failed) => true,
            _ => false,
        }
    }
}

/// A unit of agent work to execute one workflow step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    /// Set when the task was created by a workflow run (ad-hoc tasks have none)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    /// Workflow step this task executes, when run-driven
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    pub agent: AgentKind,
    pub status: TaskStatus,
    pub instructions: String,
    /// Artifact type this task is expected to produce, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creates: Option<String>,
    /// Input artifacts, resolved at creation time from the same project
    #[serde(default)]
    pub context_ids: Vec<ArtifactId>,
    /// Structured output recorded on completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// Non-empty on failed/cancelled terminal states
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub attempt_count: u32,
    /// Soft per-attempt deadline override in ms (None = scheduler default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
    /// Epoch ms of the last progress heartbeat while working
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_ms: Option<u64>,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
}

impl Task {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

crate::builder! {
    pub struct TaskBuilder => Task {
        into {
            instructions: String = "produce the artifact",
        }
        set {
            project_id: ProjectId = ProjectId::new(),
            agent: AgentKind = AgentKind::Analyst,
            status: TaskStatus = TaskStatus::Pending,
            context_ids: Vec<ArtifactId> = Vec::new(),
            attempt_count: u32 = 0,
            created_at_ms: u64 = 0,
        }
        option {
            run_id: RunId = None,
            step_id: String = None,
            creates: String = None,
            output: serde_json::Value = None,
            error: String = None,
            deadline_ms: u64 = None,
            heartbeat_ms: u64 = None,
            started_at_ms: u64 = None,
            completed_at_ms: u64 = None,
        }
        computed {
            id: TaskId = TaskId::new(),
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
