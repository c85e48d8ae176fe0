// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sw_core::{Phase, ProjectId, ProjectStatus, RunId, RunStatus};

fn state_with_run() -> (MaterializedState, RunId, ProjectId) {
    let mut state = MaterializedState::default();
    apply(&mut state, 1, 1_000, project_created_event("prj-a", "App"));
    apply(&mut state, 2, 1_001, Event::WorkflowStarted { run: sample_run("run-r", "prj-a", "wf") });
    (state, RunId::from_string("run-r"), ProjectId::from_string("prj-a"))
}

#[test]
fn step_completion_advances_monotonically() {
    let (mut state, run_id, project) = state_with_run();

    apply(
        &mut state,
        3,
        1_002,
        Event::WorkflowStepCompleted {
            run_id,
            project_id: project,
            step_id: "s0".to_string(),
            step_index: 0,
            skipped: false,
        },
    );
    assert_eq!(state.runs["run-r"].current_step_index, 1);

    apply(
        &mut state,
        4,
        1_003,
        Event::WorkflowStepCompleted {
            run_id,
            project_id: project,
            step_id: "s2".to_string(),
            step_index: 2,
            skipped: false,
        },
    );
    assert_eq!(state.runs["run-r"].current_step_index, 3);

    // Replaying an older completion cannot move the index back
    apply(
        &mut state,
        5,
        1_004,
        Event::WorkflowStepCompleted {
            run_id,
            project_id: project,
            step_id: "s0".to_string(),
            step_index: 0,
            skipped: true,
        },
    );
    assert_eq!(state.runs["run-r"].current_step_index, 3);
}

#[test]
fn pause_and_resume_mirror_onto_project() {
    let (mut state, run_id, project) = state_with_run();

    apply(
        &mut state,
        3,
        1_002,
        Event::WorkflowPaused { run_id, project_id: project, reason: "hitl_rejected".to_string() },
    );
    assert_eq!(state.runs["run-r"].status, RunStatus::Paused);
    assert_eq!(state.runs["run-r"].paused_reason.as_deref(), Some("hitl_rejected"));
    assert_eq!(state.get_project("prj-a").unwrap().status, ProjectStatus::Paused);

    apply(&mut state, 4, 1_003, Event::WorkflowResumed { run_id, project_id: project });
    assert_eq!(state.runs["run-r"].status, RunStatus::Running);
    assert!(state.runs["run-r"].paused_reason.is_none());
    assert_eq!(state.get_project("prj-a").unwrap().status, ProjectStatus::Active);
}

#[test]
fn terminal_run_status_is_final_and_mirrors() {
    let (mut state, run_id, project) = state_with_run();

    apply(
        &mut state,
        3,
        1_002,
        Event::WorkflowFailed { run_id, project_id: project, error: "definition error".to_string() },
    );
    assert_eq!(state.runs["run-r"].status, RunStatus::Failed);
    assert_eq!(state.runs["run-r"].error.as_deref(), Some("definition error"));
    assert_eq!(state.get_project("prj-a").unwrap().status, ProjectStatus::Failed);

    // A stale resume after failure changes nothing
    apply(&mut state, 4, 1_003, Event::WorkflowResumed { run_id, project_id: project });
    assert_eq!(state.runs["run-r"].status, RunStatus::Failed);
    assert_eq!(state.get_project("prj-a").unwrap().status, ProjectStatus::Failed);
}

#[test]
fn phase_change_updates_project() {
    let (mut state, run_id, project) = state_with_run();
    apply(
        &mut state,
        3,
        1_002,
        Event::WorkflowPhaseChanged { run_id, project_id: project, phase: Phase::Design },
    );
    assert_eq!(state.get_project("prj-a").unwrap().current_phase, Phase::Design);
}

#[test]
fn run_for_project_finds_the_owned_run() {
    let (state, run_id, project) = state_with_run();
    assert_eq!(state.run_for_project(&project).unwrap().id, run_id);
    assert!(state.run_for_project(&ProjectId::from_string("prj-other")).is_none());
}
