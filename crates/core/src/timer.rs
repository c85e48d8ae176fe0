// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer identifiers.
//!
//! Timers are named by purpose so the runtime can route a fired timer back
//! to the task or sweep it belongs to without extra bookkeeping.

use crate::task::TaskId;
use serde::{Deserialize, Serialize};

/// Identifier for a scheduled timer.
///
/// The string encodes the purpose: `retry:{task}:{attempt}`,
/// `grace:{task}`, and the fixed sweep names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(pub String);

impl TimerId {
    /// Retry backoff timer for a task attempt.
    pub fn retry(task_id: &TaskId, attempt: u32) -> Self {
        Self(format!("retry:{task_id}:{attempt}"))
    }

    /// Cancellation grace timer for a working task.
    pub fn grace(task_id: &TaskId) -> Self {
        Self(format!("grace:{task_id}"))
    }

    /// Periodic sweep for expired approvals.
    pub fn hitl_sweep() -> Self {
        Self("sweep:hitl".to_string())
    }

    /// Periodic scan for stalled working tasks.
    pub fn stall_scan() -> Self {
        Self("sweep:stall".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a retry timer id back into its task and attempt.
    pub fn parse_retry(&self) -> Option<(TaskId, u32)> {
        let rest = self.0.strip_prefix("retry:")?;
        let (task, attempt) = rest.rsplit_once(':')?;
        Some((TaskId::from_string(task), attempt.parse().ok()?))
    }

    /// Parse a grace timer id back into its task.
    pub fn parse_grace(&self) -> Option<TaskId> {
        self.0.strip_prefix("grace:").map(TaskId::from_string)
    }
}

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for TimerId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_roundtrip() {
        let task = TaskId::from_string("tsk-abc");
        let id = TimerId::retry(&task, 2);
        assert_eq!(id.parse_retry(), Some((task, 2)));
        assert!(id.parse_grace().is_none());
    }

    #[test]
    fn grace_roundtrip() {
        let task = TaskId::from_string("tsk-abc");
        let id = TimerId::grace(&task);
        assert_eq!(id.parse_grace(), Some(task));
        assert!(id.parse_retry().is_none());
    }

    #[test]
    fn sweep_names_are_stable() {
        assert_eq!(TimerId::hitl_sweep().as_str(), "sweep:hitl");
        assert_eq!(TimerId::stall_scan().as_str(), "sweep:stall");
    }
}
