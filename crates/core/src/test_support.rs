// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{
    AgentKind, Artifact, Event, Phase, Project, ProjectId, ProjectStatus, RunId, RunStatus, Task,
    TaskId, WorkflowRun,
};
use std::collections::HashMap;

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for core state machine types.
pub mod strategies {
    use crate::task::TaskStatus;
    use proptest::prelude::*;

    pub fn arb_task_status() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::Pending),
            Just(TaskStatus::Working),
            Just(TaskStatus::WaitingForHitl),
            Just(TaskStatus::Completed),
            Just(TaskStatus::Failed),
            Just(TaskStatus::Cancelled),
        ]
    }
}

// ── Fixture factories ───────────────────────────────────────────────────

pub fn sample_project(id: &str, name: &str) -> Project {
    Project {
        id: ProjectId::from_string(id),
        name: name.to_string(),
        status: ProjectStatus::Active,
        current_phase: Phase::Intake,
        created_at_ms: 1_000_000,
    }
}

pub fn sample_run(id: &str, project_id: &str, definition_id: &str) -> WorkflowRun {
    WorkflowRun {
        id: RunId::from_string(id),
        project_id: ProjectId::from_string(project_id),
        definition_id: definition_id.to_string(),
        definition_hash: "testhash".to_string(),
        status: RunStatus::Pending,
        current_step_index: 0,
        context_snapshot: HashMap::new(),
        step_retries: 0,
        active_tasks: Vec::new(),
        paused_reason: None,
        error: None,
        created_at_ms: 1_000_000,
        updated_at_ms: 1_000_000,
    }
}

// ── Event factory functions ─────────────────────────────────────────────

pub fn project_created_event(id: &str, name: &str) -> Event {
    Event::ProjectCreated { project: sample_project(id, name) }
}

pub fn task_created_event(project_id: &str, agent: AgentKind) -> (TaskId, Event) {
    let task = Task::builder()
        .project_id(ProjectId::from_string(project_id))
        .agent(agent)
        .created_at_ms(1_000_000)
        .build();
    (task.id, Event::TaskCreated { task })
}

pub fn task_completed_event(task_id: TaskId, project_id: &str, artifact: &Artifact) -> Event {
    Event::TaskCompleted {
        id: task_id,
        project_id: ProjectId::from_string(project_id),
        output: None,
        artifact_ids: vec![artifact.id],
    }
}

pub fn artifact_created_event(project_id: &str, artifact_type: &str) -> (Artifact, Event) {
    let artifact = Artifact::builder()
        .project_id(ProjectId::from_string(project_id))
        .artifact_type(artifact_type)
        .created_at_ms(1_000_000)
        .build();
    (artifact.clone(), Event::ArtifactCreated { artifact })
}
