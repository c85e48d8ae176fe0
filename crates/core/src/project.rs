// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project identifier and status.

use crate::phase::Phase;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a project.
    ///
    /// A project is a user's end-to-end engagement; it exclusively owns its
    /// workflow run, tasks, artifacts, approvals, counter, and events.
    pub struct ProjectId("prj-");
}

/// Status of a project. Terminal on completion or failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Paused,
    Completed,
    Failed,
}

crate::simple_display! {
    ProjectStatus {
        Active => "active",
        Paused => "paused",
        Completed => "completed",
        Failed => "failed",
    }
}

impl ProjectStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProjectStatus::Completed | ProjectStatus::Failed)
    }
}

/// A user's end-to-end engagement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub status: ProjectStatus,
    pub current_phase: Phase,
    pub created_at_ms: u64,
}

impl Project {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!ProjectStatus::Active.is_terminal());
        assert!(!ProjectStatus::Paused.is_terminal());
        assert!(ProjectStatus::Completed.is_terminal());
        assert!(ProjectStatus::Failed.is_terminal());
    }

    #[test]
    fn project_id_has_prefix() {
        assert!(ProjectId::new().as_str().starts_with("prj-"));
    }
}
