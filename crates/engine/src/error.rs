// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types.

use thiserror::Error;

/// Errors surfaced by event handling and command admission.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("project {0} is terminal")]
    ProjectTerminal(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("task {0} is already terminal")]
    AlreadyTerminal(String),

    #[error("approval not found: {0}")]
    ApprovalNotFound(String),

    #[error("workflow definition not found: {0}")]
    DefinitionNotFound(String),

    #[error("emergency stop active for project {0}")]
    Halted(String),

    #[error("task queue is full")]
    QueueFull,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage error: {0}")]
    Storage(#[from] sw_storage::WalError),
}

impl RuntimeError {
    /// Transient errors are worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, RuntimeError::QueueFull | RuntimeError::Storage(_))
    }
}
