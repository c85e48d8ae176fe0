// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Response bodies.

use serde::{Deserialize, Serialize};
use sw_core::{Approval, HitlCounter, Phase, Project, Task};

/// Stable error envelope. `code` never changes meaning; `message` is for
/// humans and may.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectCreated {
    pub project_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSubmitted {
    pub task_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStarted {
    pub workflow_run_id: String,
}

/// Live progress details for a non-terminal task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskProgressView {
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_ms: Option<u64>,
    /// No heartbeat for 90 s or more
    #[serde(default)]
    pub stalled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEntry {
    pub task_id: String,
    pub agent_type: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<TaskProgressView>,
}

impl TaskEntry {
    /// Build from a task; `now_ms` drives the stalled indicator.
    pub fn from_task(task: &Task, now_ms: u64, stall_after_ms: u64) -> Self {
        let progress = (!task.is_terminal()).then(|| {
            let heartbeat = task.heartbeat_ms;
            TaskProgressView {
                attempt: task.attempt_count,
                heartbeat_ms: heartbeat,
                stalled: task.status == sw_core::TaskStatus::Working
                    && now_ms.saturating_sub(heartbeat.unwrap_or(now_ms)) >= stall_after_ms,
            }
        });
        Self {
            task_id: task.id.to_string(),
            agent_type: task.agent.to_string(),
            status: task.status.to_string(),
            progress,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectStatusResponse {
    pub project_id: String,
    pub name: String,
    pub status: String,
    pub current_phase: Phase,
    pub tasks: Vec<TaskEntry>,
}

impl ProjectStatusResponse {
    pub fn new(project: &Project, tasks: Vec<TaskEntry>) -> Self {
        Self {
            project_id: project.id.to_string(),
            name: project.name.clone(),
            status: project.status.to_string(),
            current_phase: project.current_phase,
            tasks,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalCreated {
    pub approval_id: String,
}

/// Full approval record for status and pending listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalView {
    pub approval_id: String,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub agent_type: String,
    pub kind: String,
    pub status: String,
    pub request_payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_response: Option<String>,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responded_at_ms: Option<u64>,
}

impl From<&Approval> for ApprovalView {
    fn from(approval: &Approval) -> Self {
        Self {
            approval_id: approval.id.to_string(),
            project_id: approval.project_id.to_string(),
            task_id: approval.task_id.map(|t| t.to_string()),
            agent_type: approval.agent.to_string(),
            kind: approval.kind.to_string(),
            status: approval.status.to_string(),
            request_payload: approval.request_payload.clone(),
            action: approval.action.map(|a| a.to_string()),
            user_response: approval.user_response.clone(),
            created_at_ms: approval.created_at_ms,
            expires_at_ms: approval.expires_at_ms,
            responded_at_ms: approval.responded_at_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondOutcome {
    pub status: String,
    pub workflow_resumed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopCreated {
    pub stop_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeactivatedResponse {
    pub deactivated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterView {
    pub enabled: bool,
    pub remaining: u32,
    pub initial_value: u32,
}

impl From<HitlCounter> for CounterView {
    fn from(counter: HitlCounter) -> Self {
        Self {
            enabled: counter.enabled,
            remaining: counter.remaining,
            initial_value: counter.initial_value,
        }
    }
}

/// Counts and counter state for one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitlSummary {
    pub project_id: String,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub modified: usize,
    pub expired: usize,
    pub counter: CounterView,
    pub emergency_stop_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEventsResponse {
    pub events: Vec<crate::events::EventFrame>,
    pub has_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_entry_flags_stalls() {
        let mut task = Task::builder().build();
        task.status = sw_core::TaskStatus::Working;
        task.heartbeat_ms = Some(1_000);
        task.attempt_count = 2;

        let fresh = TaskEntry::from_task(&task, 50_000, 90_000);
        assert!(!fresh.progress.as_ref().unwrap().stalled);

        let stale = TaskEntry::from_task(&task, 95_000, 90_000);
        let progress = stale.progress.unwrap();
        assert!(progress.stalled);
        assert_eq!(progress.attempt, 2);
    }

    #[test]
    fn terminal_tasks_have_no_progress() {
        let mut task = Task::builder().build();
        task.status = sw_core::TaskStatus::Completed;
        let entry = TaskEntry::from_task(&task, 0, 90_000);
        assert!(entry.progress.is_none());
        assert_eq!(entry.status, "completed");
    }

    #[test]
    fn approval_view_serializes_ids_as_strings() {
        let approval = Approval::builder().task_id(sw_core::TaskId::new()).build();
        let view = ApprovalView::from(&approval);
        let json = serde_json::to_value(&view).unwrap();
        assert!(json["approval_id"].as_str().unwrap().starts_with("apr-"));
        assert!(json["task_id"].as_str().unwrap().starts_with("tsk-"));
    }
}
