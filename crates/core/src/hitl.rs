// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-in-the-loop types: approvals, the auto-approval counter, and
//! emergency stops.

use crate::agent::AgentKind;
use crate::project::ProjectId;
use crate::task::TaskId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a HITL approval.
    pub struct ApprovalId("apr-");
}

crate::define_id! {
    /// Unique identifier for an emergency stop record.
    pub struct StopId("stp-");
}

/// Why an approval was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalKind {
    /// A step or policy requires sign-off before the task starts
    PreExecution,
    /// Mandatory checkpoint at a phase boundary
    PhaseGate,
    /// The auto-approval budget ran out
    CounterExpiry,
    /// A phase-policy rule denied the task
    PolicyViolation,
}

crate::simple_display! {
    ApprovalKind {
        PreExecution => "pre_execution",
        PhaseGate => "phase_gate",
        CounterExpiry => "counter_expiry",
        PolicyViolation => "policy_violation",
    }
}

/// Lifecycle of an approval. Terminal on decision or expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Modified,
    Expired,
}

crate::simple_display! {
    ApprovalStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Modified => "modified",
        Expired => "expired",
    }
}

impl ApprovalStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, ApprovalStatus::Pending)
    }
}

/// A user's decision on a pending approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    Approve,
    Reject,
    Modify,
}

crate::simple_display! {
    ApprovalAction {
        Approve => "approve",
        Reject => "reject",
        Modify => "modify",
    }
}

impl ApprovalAction {
    /// The terminal approval status this action resolves to.
    pub fn resolved_status(&self) -> ApprovalStatus {
        match self {
            ApprovalAction::Approve => ApprovalStatus::Approved,
            ApprovalAction::Reject => ApprovalStatus::Rejected,
            ApprovalAction::Modify => ApprovalStatus::Modified,
        }
    }
}

/// A pending or resolved human decision.
///
/// At most one approval per (project, task) may be pending at a time.
/// `request_payload` is open JSON owned by the client surface; the core
/// validates only presence of the identifying fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    pub id: ApprovalId,
    pub project_id: ProjectId,
    /// The task under review. Phase-gate approvals review a plan, not a
    /// task, and carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    pub agent: AgentKind,
    pub kind: ApprovalKind,
    #[serde(default)]
    pub request_payload: serde_json::Value,
    pub status: ApprovalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ApprovalAction>,
    /// Freeform text from the responder (verbatim on modify)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_response: Option<String>,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responded_at_ms: Option<u64>,
    /// Seq of the event that resolved this approval. Lets the runtime
    /// tell the resolving response apart from idempotent repeats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_seq: Option<u64>,
}

impl Approval {
    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    /// Whether the approval has outlived its deadline at `now_ms`.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.is_pending() && self.expires_at_ms.is_some_and(|at| at <= now_ms)
    }
}

crate::builder! {
    pub struct ApprovalBuilder => Approval {
        set {
            project_id: ProjectId = ProjectId::new(),
            agent: AgentKind = AgentKind::Analyst,
            kind: ApprovalKind = ApprovalKind::PreExecution,
            request_payload: serde_json::Value = serde_json::Value::Null,
            status: ApprovalStatus = ApprovalStatus::Pending,
            created_at_ms: u64 = 0,
        }
        option {
            task_id: TaskId = None,
            action: ApprovalAction = None,
            user_response: String = None,
            expires_at_ms: u64 = None,
            responded_at_ms: u64 = None,
            resolution_seq: u64 = None,
        }
        computed {
            id: ApprovalId = ApprovalId::new(),
        }
    }
}

/// Per-project auto-approval budget.
///
/// Decremented on each silent auto-approval while enabled; exhaustion
/// forces a `counter_expiry` approval. Disabling the toggle does not
/// reset `remaining`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitlCounter {
    pub enabled: bool,
    pub remaining: u32,
    pub initial_value: u32,
}

impl Default for HitlCounter {
    fn default() -> Self {
        Self { enabled: false, remaining: 0, initial_value: 0 }
    }
}

impl HitlCounter {
    pub fn refilled(value: u32) -> Self {
        Self { enabled: true, remaining: value, initial_value: value }
    }
}

/// Scope of an emergency stop: everything, or one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopScope {
    Global,
    Project(ProjectId),
}

impl StopScope {
    /// Whether this scope covers the given project.
    pub fn covers(&self, project_id: &ProjectId) -> bool {
        match self {
            StopScope::Global => true,
            StopScope::Project(id) => id == project_id,
        }
    }
}

crate::simple_display! {
    StopScope {
        Global => "global",
        Project(..) => "project",
    }
}

/// Global or project-scoped halt flag.
///
/// While active, new task submissions fail fast and pending tasks in
/// scope are cancelled. Deactivation does not resume anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyStop {
    pub id: StopId,
    pub scope: StopScope,
    pub active: bool,
    pub reason: String,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deactivated_at_ms: Option<u64>,
}

/// Who requested a cancellation. Surfaced verbatim in task errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    User,
    System,
}

crate::simple_display! {
    CancelledBy {
        User => "user",
        System => "system",
    }
}

#[cfg(test)]
#[path = "hitl_tests.rs"]
mod tests;
