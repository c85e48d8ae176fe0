// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task event handlers.
//!
//! Every status change goes through `TaskStatus::can_transition_to`, so a
//! replayed or duplicated record can never walk a task backwards through
//! its state machine.

use sw_core::{Event, EventRecord, TaskStatus};

use super::MaterializedState;

pub(crate) fn apply(state: &mut MaterializedState, record: &EventRecord) {
    let ts = record.timestamp_ms;
    match &record.event {
        Event::TaskCreated { task } => {
            if !state.tasks.contains_key(task.id.as_str()) {
                state.tasks.insert(task.id.as_str().to_string(), task.clone());
            }
            // Track the in-flight step's tasks on the owning run
            if let Some(run_id) = &task.run_id {
                if let Some(run) = state.runs.get_mut(run_id.as_str()) {
                    if !run.active_tasks.contains(&task.id) {
                        run.active_tasks.push(task.id);
                    }
                }
            }
        }

        Event::TaskStarted { id, attempt, .. } => {
            if let Some(task) = state.tasks.get_mut(id.as_str()) {
                if task.status.can_transition_to(TaskStatus::Working) {
                    task.status = TaskStatus::Working;
                }
                task.attempt_count = task.attempt_count.max(*attempt);
                if task.started_at_ms.is_none() {
                    task.started_at_ms = Some(ts);
                }
                task.heartbeat_ms = Some(ts);
            }
        }

        Event::TaskProgress { id, attempt, .. } => {
            if let Some(task) = state.tasks.get_mut(id.as_str()) {
                task.attempt_count = task.attempt_count.max(*attempt);
                task.heartbeat_ms = Some(ts);
            }
        }

        Event::TaskCompleted { id, output, artifact_ids, .. } => {
            let types: Vec<(String, sw_core::ArtifactId)> = artifact_ids
                .iter()
                .filter_map(|aid| {
                    state.artifacts.get(aid.as_str()).map(|a| (a.artifact_type.clone(), a.id))
                })
                .collect();

            if let Some(task) = state.tasks.get_mut(id.as_str()) {
                if !task.status.can_transition_to(TaskStatus::Completed) {
                    return;
                }
                task.status = TaskStatus::Completed;
                task.output.clone_from(output);
                task.completed_at_ms = Some(ts);

                // Merge produced artifacts into the run's context snapshot
                if let Some(run_id) = &task.run_id {
                    if let Some(run) = state.runs.get_mut(run_id.as_str()) {
                        for (artifact_type, artifact_id) in types {
                            run.context_snapshot.insert(artifact_type, artifact_id);
                        }
                        run.updated_at_ms = ts;
                    }
                }
            }
        }

        Event::TaskFailed { id, error, .. } => {
            if let Some(task) = state.tasks.get_mut(id.as_str()) {
                if task.status.can_transition_to(TaskStatus::Failed) {
                    task.status = TaskStatus::Failed;
                    task.error = Some(error.clone());
                    task.completed_at_ms = Some(ts);
                }
            }
        }

        Event::TaskCancelled { id, reason, by, .. } => {
            if let Some(task) = state.tasks.get_mut(id.as_str()) {
                if task.status.can_transition_to(TaskStatus::Cancelled) {
                    task.status = TaskStatus::Cancelled;
                    task.error = Some(format!("cancelled by {by}: {reason}"));
                    task.completed_at_ms = Some(ts);
                }
            }
        }

        Event::TaskResumed { id, added_context, .. } => {
            if let Some(task) = state.tasks.get_mut(id.as_str()) {
                if task.status.can_transition_to(TaskStatus::Pending) {
                    task.status = TaskStatus::Pending;
                }
                for artifact_id in added_context {
                    if !task.context_ids.contains(artifact_id) {
                        task.context_ids.push(*artifact_id);
                    }
                }
            }
        }

        _ => {}
    }
}
