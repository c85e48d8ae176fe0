// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sw_core::{AgentKind, CancelledBy, ProjectId, TaskStatus};

fn state_with_task() -> (MaterializedState, sw_core::TaskId, ProjectId) {
    let mut state = MaterializedState::default();
    apply(&mut state, 1, 1_000, project_created_event("prj-a", "App"));
    let (task_id, event) = task_created_event("prj-a", AgentKind::Analyst);
    apply(&mut state, 2, 1_001, event);
    (state, task_id, ProjectId::from_string("prj-a"))
}

#[test]
fn created_task_is_pending() {
    let (state, task_id, project) = state_with_task();
    let task = state.get_task(task_id.as_str()).unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.project_id, project);
}

#[test]
fn started_task_is_working_with_heartbeat() {
    let (mut state, task_id, project) = state_with_task();
    apply(
        &mut state,
        3,
        2_000,
        Event::TaskStarted { id: task_id, project_id: project, attempt: 1 },
    );

    let task = state.get_task(task_id.as_str()).unwrap();
    assert_eq!(task.status, TaskStatus::Working);
    assert_eq!(task.attempt_count, 1);
    assert_eq!(task.started_at_ms, Some(2_000));
    assert_eq!(task.heartbeat_ms, Some(2_000));
}

#[test]
fn progress_bumps_attempt_and_heartbeat() {
    let (mut state, task_id, project) = state_with_task();
    apply(&mut state, 3, 2_000, Event::TaskStarted { id: task_id, project_id: project, attempt: 1 });
    apply(
        &mut state,
        4,
        2_500,
        Event::TaskProgress {
            id: task_id,
            project_id: project,
            attempt: 2,
            message: None,
            error: Some("timeout".to_string()),
        },
    );

    let task = state.get_task(task_id.as_str()).unwrap();
    assert_eq!(task.attempt_count, 2);
    assert_eq!(task.heartbeat_ms, Some(2_500));
    // Progress never regresses attempts
    apply(
        &mut state,
        5,
        2_600,
        Event::TaskProgress {
            id: task_id,
            project_id: project,
            attempt: 1,
            message: None,
            error: None,
        },
    );
    assert_eq!(state.get_task(task_id.as_str()).unwrap().attempt_count, 2);
}

#[test]
fn completion_merges_artifacts_into_run_snapshot() {
    let mut state = MaterializedState::default();
    apply(&mut state, 1, 1_000, project_created_event("prj-a", "App"));
    apply(&mut state, 2, 1_000, Event::WorkflowStarted { run: sample_run("run-r", "prj-a", "wf") });

    let mut task = sw_core::Task::builder()
        .project_id(ProjectId::from_string("prj-a"))
        .created_at_ms(1_001)
        .build();
    task.run_id = Some(sw_core::RunId::from_string("run-r"));
    let task_id = task.id;
    apply(&mut state, 3, 1_001, Event::TaskCreated { task });

    // Run now tracks the active task
    assert_eq!(state.runs["run-r"].active_tasks, vec![task_id]);

    let project = ProjectId::from_string("prj-a");
    apply(&mut state, 4, 1_002, Event::TaskStarted { id: task_id, project_id: project, attempt: 1 });

    let (artifact, artifact_event) = artifact_created_event("prj-a", "product_requirement");
    apply(&mut state, 5, 1_003, artifact_event);
    apply(&mut state, 6, 1_004, task_completed_event(task_id, "prj-a", &artifact));

    let task = state.get_task(task_id.as_str()).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.completed_at_ms, Some(1_004));

    let run = &state.runs["run-r"];
    assert_eq!(run.context_snapshot["product_requirement"], artifact.id);
}

#[test]
fn completion_without_working_is_rejected() {
    let (mut state, task_id, project) = state_with_task();
    // Straight pending → completed violates the machine; reducer refuses
    apply(
        &mut state,
        3,
        2_000,
        Event::TaskCompleted { id: task_id, project_id: project, output: None, artifact_ids: vec![] },
    );
    assert_eq!(state.get_task(task_id.as_str()).unwrap().status, TaskStatus::Pending);
}

#[test]
fn cancelled_task_records_who_cancelled() {
    let (mut state, task_id, project) = state_with_task();
    apply(
        &mut state,
        3,
        2_000,
        Event::TaskCancelled {
            id: task_id,
            project_id: project,
            reason: "user_halt".to_string(),
            by: CancelledBy::User,
        },
    );

    let task = state.get_task(task_id.as_str()).unwrap();
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert_eq!(task.error.as_deref(), Some("cancelled by user: user_halt"));
}

#[test]
fn terminal_tasks_ignore_further_transitions() {
    let (mut state, task_id, project) = state_with_task();
    apply(&mut state, 3, 2_000, Event::TaskStarted { id: task_id, project_id: project, attempt: 1 });
    apply(
        &mut state,
        4,
        2_100,
        Event::TaskFailed { id: task_id, project_id: project, error: "boom".to_string() },
    );
    apply(
        &mut state,
        5,
        2_200,
        Event::TaskCancelled {
            id: task_id,
            project_id: project,
            reason: "late".to_string(),
            by: CancelledBy::System,
        },
    );

    let task = state.get_task(task_id.as_str()).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error.as_deref(), Some("boom"));
}

#[test]
fn resumed_task_returns_to_pending_with_added_context() {
    let (mut state, task_id, project) = state_with_task();
    // Put it in waiting via an approval
    let approval = sw_core::Approval::builder()
        .project_id(project)
        .task_id(task_id)
        .created_at_ms(2_000u64)
        .build();
    apply(&mut state, 3, 2_000, Event::HitlRequested { approval });

    let guidance = sw_core::ArtifactId::new();
    apply(
        &mut state,
        4,
        2_100,
        Event::TaskResumed { id: task_id, project_id: project, added_context: vec![guidance] },
    );

    let task = state.get_task(task_id.as_str()).unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(task.context_ids.contains(&guidance));
}
