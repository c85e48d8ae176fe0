// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow run event handlers.
//!
//! The run mirrors its terminal status onto the owning project: a
//! completed run completes the project, a failed run fails it.

use sw_core::{Event, EventRecord, ProjectStatus, RunStatus};

use super::MaterializedState;

pub(crate) fn apply(state: &mut MaterializedState, record: &EventRecord) {
    let ts = record.timestamp_ms;
    match &record.event {
        Event::WorkflowStarted { run } => {
            if !state.runs.contains_key(run.id.as_str()) {
                state.runs.insert(run.id.as_str().to_string(), run.clone());
            }
            set_project_status(state, run.project_id.as_str(), ProjectStatus::Active);
        }

        Event::WorkflowStepStarted { run_id, .. } => {
            if let Some(run) = state.runs.get_mut(run_id.as_str()) {
                if !run.status.is_terminal() {
                    run.status = RunStatus::Running;
                }
                run.updated_at_ms = ts;
            }
        }

        Event::WorkflowStepCompleted { run_id, step_id, step_index, .. } => {
            // Only this step's tasks leave the active set — siblings in a
            // parallel group may still be in flight
            let step_tasks: Vec<sw_core::TaskId> = state
                .tasks
                .values()
                .filter(|t| {
                    t.run_id.as_ref().is_some_and(|r| r == run_id)
                        && t.step_id.as_deref() == Some(step_id.as_str())
                })
                .map(|t| t.id)
                .collect();
            if let Some(run) = state.runs.get_mut(run_id.as_str()) {
                // Monotonic: replay of an old record never moves the index back
                run.current_step_index = run.current_step_index.max(step_index + 1);
                run.step_retries = 0;
                run.active_tasks.retain(|t| !step_tasks.contains(t));
                run.updated_at_ms = ts;
            }
        }

        Event::WorkflowStepRetried { run_id, retries, replaced_task, .. } => {
            if let Some(run) = state.runs.get_mut(run_id.as_str()) {
                run.step_retries = run.step_retries.max(*retries);
                run.active_tasks.retain(|t| t != replaced_task);
                run.updated_at_ms = ts;
            }
        }

        Event::WorkflowPaused { run_id, project_id, reason } => {
            if let Some(run) = state.runs.get_mut(run_id.as_str()) {
                if !run.status.is_terminal() {
                    run.status = RunStatus::Paused;
                    run.paused_reason = Some(reason.clone());
                }
                run.updated_at_ms = ts;
            }
            set_project_status(state, project_id.as_str(), ProjectStatus::Paused);
        }

        Event::WorkflowResumed { run_id, project_id } => {
            if let Some(run) = state.runs.get_mut(run_id.as_str()) {
                if !run.status.is_terminal() {
                    run.status = RunStatus::Running;
                    run.paused_reason = None;
                }
                run.updated_at_ms = ts;
            }
            set_project_status(state, project_id.as_str(), ProjectStatus::Active);
        }

        Event::WorkflowCompleted { run_id, project_id } => {
            if let Some(run) = state.runs.get_mut(run_id.as_str()) {
                run.status = RunStatus::Completed;
                run.paused_reason = None;
                run.updated_at_ms = ts;
            }
            set_project_status(state, project_id.as_str(), ProjectStatus::Completed);
        }

        Event::WorkflowFailed { run_id, project_id, error } => {
            if let Some(run) = state.runs.get_mut(run_id.as_str()) {
                run.status = RunStatus::Failed;
                run.error = Some(error.clone());
                run.updated_at_ms = ts;
            }
            set_project_status(state, project_id.as_str(), ProjectStatus::Failed);
        }

        _ => {}
    }
}

fn set_project_status(state: &mut MaterializedState, project_id: &str, status: ProjectStatus) {
    if let Some(project) = state.projects.get_mut(project_id) {
        // Terminal project statuses are final
        if !project.status.is_terminal() {
            project.status = status;
        }
    }
}
