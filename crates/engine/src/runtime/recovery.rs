// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup recovery.
//!
//! Runs after the snapshot is loaded and the WAL tail is applied, so the
//! materialized state reflects everything that was durable at the crash.
//! Four passes: resolved-but-unacted approvals, orphaned working tasks,
//! stranded pending tasks, and stalled runs.

use super::{hitl, workflow, Engine};
use sw_core::{ApprovalStatus, CancelledBy, Clock, Effect, Event, RunStatus, TaskStatus};

pub(super) fn recover<C: Clock + 'static>(engine: &Engine<C>) -> Vec<Effect> {
    let mut effects = Vec::new();
    let now = engine.clock().epoch_ms();
    let orphan_ms = engine.config().orphan_after.as_millis() as u64;

    effects.extend(enact_unacted_approvals(engine));

    let (working, pending, stalled_runs) = {
        let state = engine.state();
        let state = state.lock();

        let working: Vec<sw_core::Task> = state
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Working && !engine.dispatcher.is_running(&t.id))
            .cloned()
            .collect();

        let pending: Vec<sw_core::Task> = state
            .tasks
            .values()
            .filter(|t| {
                t.status == TaskStatus::Pending
                    && !engine.dispatcher.is_running(&t.id)
                    && state.pending_approval_for_task(t.id.as_str()).is_none()
            })
            .cloned()
            .collect();

        let stalled_runs: Vec<sw_core::RunId> = state
            .runs
            .values()
            .filter(|r| r.status == RunStatus::Running || r.status == RunStatus::Pending)
            .filter(|r| {
                let has_live_task = r.active_tasks.iter().any(|id| {
                    state.tasks.get(id.as_str()).is_some_and(|t| !t.is_terminal())
                });
                let has_pending_approval = state
                    .approvals
                    .values()
                    .any(|a| a.is_pending() && a.project_id == r.project_id);
                !has_live_task && !has_pending_approval
            })
            .map(|r| r.id)
            .collect();

        (working, pending, stalled_runs)
    };

    for task in working {
        let heartbeat = task.heartbeat_ms.or(task.started_at_ms).unwrap_or(task.created_at_ms);
        if now.saturating_sub(heartbeat) < orphan_ms {
            continue;
        }
        if task.attempt_count < engine.config().attempt_ceiling {
            tracing::info!(task_id = %task.id, "re-enqueueing orphaned task");
            let attempt = task.attempt_count + 1;
            effects.push(Effect::ExecuteTask { task, attempt });
        } else {
            tracing::warn!(task_id = %task.id, "orphaned task out of attempts");
            effects.push(Effect::Emit {
                event: Event::TaskFailed {
                    id: task.id,
                    project_id: task.project_id,
                    error: "orphaned".to_string(),
                },
            });
        }
    }

    for task in pending {
        let stopped = engine
            .state()
            .lock()
            .active_stop_for(&task.project_id)
            .is_some();
        if stopped {
            effects.push(Effect::Emit {
                event: Event::TaskCancelled {
                    id: task.id,
                    project_id: task.project_id,
                    reason: "emergency_stop".to_string(),
                    by: CancelledBy::System,
                },
            });
        } else {
            // Admission already happened when the task was created; the
            // dispatch itself is what the crash lost
            let attempt = task.attempt_count + 1;
            effects.push(Effect::ExecuteTask { task, attempt });
        }
    }

    for run_id in stalled_runs {
        let from = engine
            .state()
            .lock()
            .runs
            .get(run_id.as_str())
            .map(|r| r.current_step_index)
            .unwrap_or(0);
        tracing::info!(%run_id, from, "re-driving stalled run");
        match workflow::drive(engine, run_id, from) {
            Ok(drive_effects) => effects.extend(drive_effects),
            Err(e) => tracing::error!(%run_id, error = %e, "failed to re-drive run"),
        }
    }

    effects
}

/// Approvals whose resolution was recorded but whose consequences never
/// landed before the crash: the task is still parked, or the gate's run
/// is still paused behind it. Re-enact the recorded decision.
fn enact_unacted_approvals<C: Clock + 'static>(engine: &Engine<C>) -> Vec<Effect> {
    let candidates: Vec<sw_core::Approval> = {
        let state = engine.state();
        let state = state.lock();
        state
            .approvals
            .values()
            .filter(|a| !a.is_pending())
            .filter(|a| {
                if let Some(task_id) = a.task_id {
                    return state
                        .tasks
                        .get(task_id.as_str())
                        .is_some_and(|t| t.status == TaskStatus::WaitingForHitl);
                }
                // Gate approvals: the run never moved past the gate
                let gate_index = a
                    .request_payload
                    .get("step_index")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as usize;
                a.request_payload
                    .get("run_id")
                    .and_then(|v| v.as_str())
                    .and_then(|id| state.runs.get(id))
                    .is_some_and(|r| {
                        r.status == RunStatus::Paused && r.current_step_index <= gate_index
                    })
            })
            .cloned()
            .collect()
    };

    let mut effects = Vec::new();
    for approval in candidates {
        tracing::info!(approval_id = %approval.id, status = %approval.status, "re-enacting resolved approval");
        match (approval.status, approval.action) {
            (ApprovalStatus::Expired, _) => {
                if let Some(task_id) = approval.task_id {
                    effects.push(Effect::Emit {
                        event: Event::TaskFailed {
                            id: task_id,
                            project_id: approval.project_id,
                            error: "hitl_timeout".to_string(),
                        },
                    });
                }
            }
            (_, Some(action)) => {
                let user_text = approval.user_response.clone();
                match hitl::enact_response(engine, &approval, action, user_text.as_deref()) {
                    Ok(enacted) => effects.extend(enacted),
                    Err(e) => {
                        tracing::error!(approval_id = %approval.id, error = %e, "re-enact failed")
                    }
                }
            }
            _ => {}
        }
    }
    effects
}
