// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request bodies and query parameters.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
}

/// Body for `POST /projects/{id}/tasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTaskRequest {
    pub agent_type: String,
    pub instructions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_ids: Option<Vec<String>>,
    /// Per-attempt deadline override in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

/// Body for `POST /projects/{id}/artifacts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutArtifactRequest {
    pub source_agent: String,
    pub artifact_type: String,
    pub content: serde_json::Value,
    /// Artifact id this one supersedes, as a hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<String>,
}

/// Body for `POST /hitl/counter/{project_id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CounterUpdateRequest {
    /// Refill the budget to this value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    /// Flip the auto-approval toggle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Body for `POST /hitl/request-approval`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestApprovalRequest {
    pub project_id: String,
    pub task_id: String,
    pub agent_type: String,
    pub instructions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_tokens: Option<u64>,
}

/// Body for `POST /hitl/approve/{approval_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondRequest {
    /// approve | reject | modify
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_text: Option<String>,
}

/// Body for `POST /hitl/emergency-stop`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyStopRequest {
    /// "global" or a project id
    pub scope: String,
    pub reason: String,
}

/// Query string for `GET /audit/events`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditQueryParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// RFC 3339 timestamp or epoch milliseconds, inclusive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
    /// RFC 3339 timestamp or epoch milliseconds, exclusive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}
