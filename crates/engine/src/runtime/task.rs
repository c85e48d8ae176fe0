// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task lifecycle handlers: admission, retries, cancellation plumbing,
//! and the stall scan.

use super::Engine;
use crate::error::RuntimeError;
use crate::gate::{GateDecision, GateInput};
use sw_core::{
    ApprovalKind, CancelledBy, Clock, Effect, Event, Task, TaskId, TaskStatus, TimerId,
};

/// Admission for ad-hoc tasks (no owning run): run-owned tasks were
/// admitted by the workflow driver before their `task.created` was
/// emitted.
pub(super) fn handle_created<C: Clock + 'static>(
    engine: &Engine<C>,
    task: &Task,
) -> Result<Vec<Effect>, RuntimeError> {
    if task.run_id.is_some() {
        return Ok(Vec::new());
    }
    Ok(admit(engine, task, None))
}

/// Evaluate the HITL gate for a task about to work and return the
/// effects that enact the decision.
///
/// Counter consumption mutates state here, under the engine loop's
/// single-threaded event handling, which is what makes decrements
/// linearizable; the emitted `counter.decremented` carries the absolute
/// result so replay converges on the same value.
pub(super) fn admit<C: Clock + 'static>(
    engine: &Engine<C>,
    task: &Task,
    step_approval: Option<ApprovalKind>,
) -> Vec<Effect> {
    let mut effects = Vec::new();
    let (decision, phase) = {
        let state = engine.state();
        let state = state.lock();
        let phase = state
            .get_project(task.project_id.as_str())
            .map(|p| p.current_phase)
            .unwrap_or(sw_core::Phase::Intake);
        let input = GateInput {
            phase,
            agent: task.agent,
            instructions: &task.instructions,
            step_approval,
            stop_active: state.active_stop_for(&task.project_id).is_some(),
            counter: state.counter(&task.project_id),
        };
        (engine.gate.evaluate(&input), phase)
    };

    match decision {
        GateDecision::AutoApprove { decremented } => {
            if let Some(remaining) = decremented {
                {
                    let state = engine.state();
                    let mut state = state.lock();
                    if let Some(counter) =
                        state.counters.get_mut(task.project_id.as_str())
                    {
                        counter.remaining = remaining;
                    }
                }
                effects.push(Effect::Emit {
                    event: Event::CounterDecremented {
                        project_id: task.project_id,
                        remaining,
                    },
                });
                if remaining == 0 {
                    effects.push(Effect::Emit {
                        event: Event::CounterExhausted { project_id: task.project_id },
                    });
                }
            }
            // One working task per project: ad-hoc tasks queue behind
            // whatever is running and are dequeued on its terminal event.
            // Run-owned tasks are sequenced by the workflow driver (and
            // parallel groups are its explicit exception).
            if task.run_id.is_none() && project_busy(engine, task) {
                tracing::debug!(task_id = %task.id, "project busy, task queued");
            } else {
                effects.push(Effect::ExecuteTask { task: task.clone(), attempt: 1 });
            }
        }
        GateDecision::NeedsApproval { kind, reason } => {
            if kind == ApprovalKind::PolicyViolation {
                effects.push(Effect::Emit {
                    event: Event::PolicyViolation {
                        project_id: task.project_id,
                        task_id: task.id,
                        agent: task.agent,
                        rule: reason.clone(),
                    },
                });
            }
            let now = engine.clock().epoch_ms();
            let approval = sw_core::Approval {
                id: sw_core::ApprovalId::new(),
                project_id: task.project_id,
                task_id: Some(task.id),
                agent: task.agent,
                kind,
                request_payload: serde_json::json!({
                    "reason": reason,
                    "phase": phase.to_string(),
                    "step_id": task.step_id,
                    "instructions": task.instructions,
                }),
                status: sw_core::ApprovalStatus::Pending,
                action: None,
                user_response: None,
                created_at_ms: now,
                expires_at_ms: engine
                    .config()
                    .approval_ttl
                    .map(|ttl| now + ttl.as_millis() as u64),
                responded_at_ms: None,
                resolution_seq: None,
            };
            effects.push(Effect::Emit { event: Event::HitlRequested { approval } });
            if let Some(run_id) = task.run_id {
                effects.push(Effect::Emit {
                    event: Event::WorkflowPaused {
                        run_id,
                        project_id: task.project_id,
                        reason: format!("awaiting_approval:{kind}"),
                    },
                });
            }
        }
        GateDecision::Halt { reason } => {
            effects.push(Effect::Emit {
                event: Event::TaskCancelled {
                    id: task.id,
                    project_id: task.project_id,
                    reason: reason.clone(),
                    by: CancelledBy::System,
                },
            });
            if let Some(run_id) = task.run_id {
                effects.push(Effect::Emit {
                    event: Event::WorkflowPaused {
                        run_id,
                        project_id: task.project_id,
                        reason,
                    },
                });
            }
        }
    }
    effects
}

/// A progress event carrying an error marks a transiently failed attempt;
/// arm the backoff timer for the next one.
pub(super) fn handle_progress<C: Clock + 'static>(
    engine: &Engine<C>,
    task_id: &TaskId,
    attempt: u32,
    error: Option<&str>,
) -> Result<Vec<Effect>, RuntimeError> {
    if error.is_none() {
        return Ok(Vec::new());
    }
    let Some(task) = engine.state().lock().get_task(task_id.as_str()).cloned() else {
        return Ok(Vec::new());
    };
    if task.status != TaskStatus::Working || attempt >= engine.config().attempt_ceiling {
        // Terminal handling (task.failed) is the dispatcher's call
        return Ok(Vec::new());
    }
    Ok(vec![Effect::SetTimer {
        id: TimerId::retry(task_id, attempt + 1),
        duration: engine.config().backoff_for(attempt),
    }])
}

/// Approved task returned to pending: run the next attempt (or queue it
/// if the project is mid-task).
pub(super) fn handle_resumed<C: Clock + 'static>(
    engine: &Engine<C>,
    task_id: &TaskId,
) -> Result<Vec<Effect>, RuntimeError> {
    let Some(task) = engine.state().lock().get_task(task_id.as_str()).cloned() else {
        return Ok(Vec::new());
    };
    if task.status != TaskStatus::Pending {
        return Ok(Vec::new());
    }
    if task.run_id.is_none() && project_busy(engine, &task) {
        return Ok(Vec::new());
    }
    let attempt = task.attempt_count + 1;
    Ok(vec![Effect::ExecuteTask { task, attempt }])
}

/// Another task in the project is mid-work (or already handed to the
/// dispatcher — `working` only shows up once `task.started` lands).
fn project_busy<C: Clock + 'static>(engine: &Engine<C>, task: &Task) -> bool {
    let state = engine.state();
    let state = state.lock();
    state.tasks.values().any(|t| {
        t.id != task.id
            && t.project_id == task.project_id
            && (t.status == TaskStatus::Working || engine.dispatcher.is_running(&t.id))
    })
}

/// After a terminal event in a project: start the oldest queued ad-hoc
/// task, if the project is now idle.
pub(super) fn dequeue_next<C: Clock + 'static>(
    engine: &Engine<C>,
    project_id: &sw_core::ProjectId,
) -> Vec<Effect> {
    let next = {
        let state = engine.state();
        let state = state.lock();
        let busy = state.tasks.values().any(|t| {
            t.project_id == *project_id
                && (t.status == TaskStatus::Working || engine.dispatcher.is_running(&t.id))
        });
        if busy {
            None
        } else {
            state
                .tasks
                .values()
                .filter(|t| {
                    t.project_id == *project_id
                        && t.status == TaskStatus::Pending
                        && t.run_id.is_none()
                        && state.pending_approval_for_task(t.id.as_str()).is_none()
                })
                .min_by_key(|t| (t.created_at_ms, t.id.as_str().to_string()))
                .cloned()
        }
    };
    match next {
        Some(task) if !engine.dispatcher.is_running(&task.id) => {
            let attempt = task.attempt_count + 1;
            vec![Effect::ExecuteTask { task, attempt }]
        }
        _ => Vec::new(),
    }
}

/// Cancellation request routing: pending and waiting tasks cancel
/// immediately, working tasks get the cooperative signal plus a grace
/// timer.
pub(super) fn handle_cancel_requested<C: Clock + 'static>(
    engine: &Engine<C>,
    task_id: &TaskId,
    reason: &str,
    by: CancelledBy,
) -> Result<Vec<Effect>, RuntimeError> {
    let Some(task) = engine.state().lock().get_task(task_id.as_str()).cloned() else {
        return Ok(Vec::new());
    };
    match task.status {
        TaskStatus::Pending | TaskStatus::WaitingForHitl => Ok(vec![Effect::Emit {
            event: Event::TaskCancelled {
                id: task.id,
                project_id: task.project_id,
                reason: reason.to_string(),
                by,
            },
        }]),
        TaskStatus::Working => Ok(vec![
            Effect::SignalCancel { task_id: task.id, reason: reason.to_string(), by },
            Effect::SetTimer {
                id: TimerId::grace(&task.id),
                duration: engine.config().cancel_grace,
            },
        ]),
        _ => Ok(Vec::new()),
    }
}

/// Retry backoff elapsed: run the next attempt if the task still wants it.
pub(super) fn handle_retry_due<C: Clock + 'static>(
    engine: &Engine<C>,
    task_id: &TaskId,
    attempt: u32,
) -> Result<Vec<Effect>, RuntimeError> {
    let Some(task) = engine.state().lock().get_task(task_id.as_str()).cloned() else {
        return Ok(Vec::new());
    };
    if task.status != TaskStatus::Working {
        return Ok(Vec::new());
    }
    if engine.state().lock().active_stop_for(&task.project_id).is_some() {
        return Ok(vec![Effect::Emit {
            event: Event::TaskCancelled {
                id: task.id,
                project_id: task.project_id,
                reason: "emergency_stop".to_string(),
                by: CancelledBy::System,
            },
        }]);
    }
    Ok(vec![Effect::ExecuteTask { task, attempt }])
}

/// Cancellation grace elapsed: abandon the attempt and fail the task.
pub(super) fn handle_grace_expired<C: Clock + 'static>(
    engine: &Engine<C>,
    task_id: &TaskId,
) -> Result<Vec<Effect>, RuntimeError> {
    let Some(task) = engine.state().lock().get_task(task_id.as_str()).cloned() else {
        return Ok(Vec::new());
    };
    if task.is_terminal() {
        return Ok(Vec::new());
    }
    Ok(vec![
        Effect::AbandonTask { task_id: task.id },
        Effect::Emit {
            event: Event::TaskFailed {
                id: task.id,
                project_id: task.project_id,
                error: "cancellation grace exceeded".to_string(),
            },
        },
    ])
}

/// Flag working tasks that have gone silent.
pub(super) fn scan_stalled<C: Clock + 'static>(engine: &Engine<C>) -> Vec<Effect> {
    let now = engine.clock().epoch_ms();
    let threshold = engine.config().stall_after.as_millis() as u64;
    let state = engine.state();
    let state = state.lock();
    state
        .tasks
        .values()
        .filter(|t| t.status == TaskStatus::Working)
        .filter_map(|t| {
            let idle = now.saturating_sub(t.heartbeat_ms.unwrap_or(t.created_at_ms));
            (idle >= threshold).then(|| Effect::Emit {
                event: Event::TaskStalled {
                    id: t.id,
                    project_id: t.project_id,
                    idle_ms: idle,
                },
            })
        })
        .collect()
}
