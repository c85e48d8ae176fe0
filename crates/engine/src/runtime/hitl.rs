// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Approval resolution, expiry sweeps, and emergency stops.

use super::workflow::emit;
use super::{workflow, Engine};
use crate::error::RuntimeError;
use sw_core::{
    ApprovalAction, Artifact, ArtifactId, ArtifactMeta, CancelledBy, Clock, Effect,
    EmergencyStop, Event, RunStatus, TaskStatus, TimerId,
};

/// React to a resolved approval. The reducer already recorded the
/// outcome (first response wins); this turns the decision into motion.
pub(super) fn handle_response<C: Clock + 'static>(
    engine: &Engine<C>,
    seq: u64,
    approval_id: &sw_core::ApprovalId,
    action: ApprovalAction,
    user_text: Option<&str>,
) -> Result<Vec<Effect>, RuntimeError> {
    let Some(approval) = engine.state().lock().get_approval(approval_id.as_str()).cloned()
    else {
        return Ok(Vec::new());
    };
    // Only the response that actually resolved the approval produces
    // effects; repeats and conflicting late responses are no-ops
    if approval.is_pending()
        || approval.resolution_seq != Some(seq)
        || approval.action != Some(action)
    {
        return Ok(Vec::new());
    }
    enact_response(engine, &approval, action, user_text)
}

/// Turn a resolved approval into motion. Also called from recovery for
/// approvals whose resolution was recorded but never acted on before a
/// crash.
pub(super) fn enact_response<C: Clock + 'static>(
    engine: &Engine<C>,
    approval: &sw_core::Approval,
    action: ApprovalAction,
    user_text: Option<&str>,
) -> Result<Vec<Effect>, RuntimeError> {
    let payload = &approval.request_payload;
    if payload.get("gate").and_then(|v| v.as_bool()) == Some(true) {
        return handle_gate_response(engine, approval, action, user_text);
    }
    if payload.get("escalation").and_then(|v| v.as_str()).is_some() {
        return handle_escalation_response(engine, approval, action, user_text);
    }
    handle_task_response(engine, approval, action, user_text)
}

fn run_of_payload(payload: &serde_json::Value) -> Option<sw_core::RunId> {
    payload.get("run_id").and_then(|v| v.as_str()).map(sw_core::RunId::from_string)
}

fn handle_gate_response<C: Clock + 'static>(
    engine: &Engine<C>,
    approval: &sw_core::Approval,
    action: ApprovalAction,
    user_text: Option<&str>,
) -> Result<Vec<Effect>, RuntimeError> {
    let Some(run_id) = run_of_payload(&approval.request_payload) else {
        return Ok(Vec::new());
    };
    let step_index = approval
        .request_payload
        .get("step_index")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as usize;

    match action {
        ApprovalAction::Approve | ApprovalAction::Modify => {
            let mut effects = Vec::new();
            if let (ApprovalAction::Modify, Some(text)) = (action, user_text) {
                effects.push(emit(Event::ArtifactCreated {
                    artifact: guidance_artifact(engine, approval, text),
                }));
            }
            effects.push(emit(Event::WorkflowResumed {
                run_id,
                project_id: approval.project_id,
            }));
            effects.extend(workflow::drive(engine, run_id, step_index + 1)?);
            Ok(effects)
        }
        ApprovalAction::Reject => Ok(vec![emit(Event::WorkflowPaused {
            run_id,
            project_id: approval.project_id,
            reason: "hitl_rejected".to_string(),
        })]),
    }
}

fn handle_escalation_response<C: Clock + 'static>(
    engine: &Engine<C>,
    approval: &sw_core::Approval,
    action: ApprovalAction,
    user_text: Option<&str>,
) -> Result<Vec<Effect>, RuntimeError> {
    let Some(run_id) = run_of_payload(&approval.request_payload) else {
        return Ok(Vec::new());
    };
    let (run, failed_task) = {
        let state = engine.state();
        let state = state.lock();
        let run = state.runs.get(run_id.as_str()).cloned();
        let failed = approval
            .task_id
            .and_then(|id| state.tasks.get(id.as_str()).cloned());
        (run, failed)
    };
    let Some(run) = run else {
        return Ok(Vec::new());
    };
    if run.is_terminal() {
        return Ok(Vec::new());
    }
    let Some((def, _)) = engine.definition(&run.definition_id) else {
        return Ok(Vec::new());
    };
    let step_index = approval
        .request_payload
        .get("step_index")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as usize;
    let Some(step) = def.step_at(step_index).cloned() else {
        return Ok(Vec::new());
    };
    let optional = approval
        .request_payload
        .get("optional")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    match action {
        ApprovalAction::Approve => {
            // Retry the step
            let mut effects =
                vec![emit(Event::WorkflowResumed { run_id, project_id: run.project_id })];
            match &failed_task {
                Some(failed) => {
                    effects.extend(workflow::retry_step(
                        engine, &run, &step, step_index, failed, None,
                    ));
                }
                // missing_input escalations have no task; re-drive the step
                None => effects.extend(workflow::drive(engine, run_id, step_index)?),
            }
            Ok(effects)
        }
        ApprovalAction::Modify => {
            let guidance = user_text.map(|text| guidance_artifact(engine, approval, text));
            let mut effects = Vec::new();
            if let Some(artifact) = &guidance {
                effects.push(emit(Event::ArtifactCreated { artifact: artifact.clone() }));
            }
            effects.push(emit(Event::WorkflowResumed { run_id, project_id: run.project_id }));
            if optional {
                // Skip the step and move on
                effects.push(emit(Event::WorkflowStepCompleted {
                    run_id,
                    project_id: run.project_id,
                    step_id: step.id.clone(),
                    step_index,
                    skipped: true,
                }));
                effects.extend(workflow::drive(engine, run_id, step_index + 1)?);
            } else {
                // Required step: retry with the guidance attached
                match &failed_task {
                    Some(failed) => effects.extend(workflow::retry_step(
                        engine,
                        &run,
                        &step,
                        step_index,
                        failed,
                        guidance.map(|g| g.id),
                    )),
                    None => effects.extend(workflow::drive(engine, run_id, step_index)?),
                }
            }
            Ok(effects)
        }
        ApprovalAction::Reject => Ok(vec![emit(Event::WorkflowFailed {
            run_id,
            project_id: run.project_id,
            error: format!("aborted by user after failure of step {}", step.id),
        })]),
    }
}

fn handle_task_response<C: Clock + 'static>(
    engine: &Engine<C>,
    approval: &sw_core::Approval,
    action: ApprovalAction,
    user_text: Option<&str>,
) -> Result<Vec<Effect>, RuntimeError> {
    let Some(task_id) = approval.task_id else {
        return Ok(Vec::new());
    };
    let Some(task) = engine.state().lock().get_task(task_id.as_str()).cloned() else {
        return Ok(Vec::new());
    };
    if task.is_terminal() {
        // An emergency stop got there first; the outcome stands
        return Ok(Vec::new());
    }

    match action {
        ApprovalAction::Approve => {
            let mut effects = vec![emit(Event::TaskResumed {
                id: task.id,
                project_id: task.project_id,
                added_context: Vec::new(),
            })];
            effects.extend(resume_run_if_paused(engine, &task));
            Ok(effects)
        }
        ApprovalAction::Modify => {
            // The user's text rides along as an extra input artifact
            let mut effects = Vec::new();
            let mut added = Vec::new();
            if let Some(text) = user_text {
                let artifact = guidance_artifact(engine, approval, text);
                added.push(artifact.id);
                effects.push(emit(Event::ArtifactCreated { artifact }));
            }
            effects.push(emit(Event::TaskResumed {
                id: task.id,
                project_id: task.project_id,
                added_context: added,
            }));
            effects.extend(resume_run_if_paused(engine, &task));
            Ok(effects)
        }
        ApprovalAction::Reject => {
            let mut effects = vec![emit(Event::TaskCancelled {
                id: task.id,
                project_id: task.project_id,
                reason: "hitl_rejected".to_string(),
                by: CancelledBy::User,
            })];
            if let Some(run_id) = task.run_id {
                effects.push(emit(Event::WorkflowPaused {
                    run_id,
                    project_id: task.project_id,
                    reason: "hitl_rejected".to_string(),
                }));
            }
            Ok(effects)
        }
    }
}

fn resume_run_if_paused<C: Clock + 'static>(
    engine: &Engine<C>,
    task: &sw_core::Task,
) -> Vec<Effect> {
    let Some(run_id) = task.run_id else {
        return Vec::new();
    };
    let paused = engine
        .state()
        .lock()
        .runs
        .get(run_id.as_str())
        .is_some_and(|r| r.status == RunStatus::Paused);
    if paused {
        vec![emit(Event::WorkflowResumed { run_id, project_id: task.project_id })]
    } else {
        Vec::new()
    }
}

fn guidance_artifact<C: Clock + 'static>(
    engine: &Engine<C>,
    approval: &sw_core::Approval,
    text: &str,
) -> Artifact {
    Artifact {
        id: ArtifactId::new(),
        project_id: approval.project_id,
        source_agent: approval.agent,
        artifact_type: "user_guidance".to_string(),
        content: serde_json::json!({
            "text": text,
            "approval_id": approval.id,
        }),
        metadata: ArtifactMeta::default(),
        created_at_ms: engine.clock().epoch_ms(),
    }
}

/// Periodic sweep: expire overdue approvals, failing their tasks and
/// pausing their workflows.
pub(super) fn expire_stale<C: Clock + 'static>(engine: &Engine<C>) -> Vec<Effect> {
    let now = engine.clock().epoch_ms();
    let expired: Vec<sw_core::Approval> = {
        let state = engine.state();
        let state = state.lock();
        state.approvals.values().filter(|a| a.is_expired_at(now)).cloned().collect()
    };

    let mut effects = Vec::new();
    for approval in expired {
        // Pause first so the task-failure handler does not escalate on
        // top of the expiry
        let run_id = {
            let state = engine.state();
            let state = state.lock();
            approval
                .task_id
                .and_then(|id| state.tasks.get(id.as_str()).and_then(|t| t.run_id))
                .or_else(|| run_of_payload(&approval.request_payload))
        };
        if let Some(run_id) = run_id {
            effects.push(emit(Event::WorkflowPaused {
                run_id,
                project_id: approval.project_id,
                reason: "hitl_timeout".to_string(),
            }));
        }
        effects.push(emit(Event::HitlExpired {
            id: approval.id,
            project_id: approval.project_id,
        }));
        if let Some(task_id) = approval.task_id {
            effects.push(emit(Event::TaskFailed {
                id: task_id,
                project_id: approval.project_id,
                error: "hitl_timeout".to_string(),
            }));
        }
    }
    effects
}

/// Emergency stop: cancel everything in scope, pause covered runs.
pub(super) fn handle_stop_activated<C: Clock + 'static>(
    engine: &Engine<C>,
    stop: &EmergencyStop,
) -> Result<Vec<Effect>, RuntimeError> {
    let (tasks, runs) = {
        let state = engine.state();
        let state = state.lock();
        let tasks: Vec<sw_core::Task> = state
            .tasks
            .values()
            .filter(|t| !t.is_terminal() && stop.scope.covers(&t.project_id))
            .cloned()
            .collect();
        let runs: Vec<(sw_core::RunId, sw_core::ProjectId)> = state
            .runs
            .values()
            .filter(|r| {
                !r.is_terminal()
                    && r.status != RunStatus::Paused
                    && stop.scope.covers(&r.project_id)
            })
            .map(|r| (r.id, r.project_id))
            .collect();
        (tasks, runs)
    };

    let mut effects = Vec::new();
    for task in tasks {
        match task.status {
            TaskStatus::Pending | TaskStatus::WaitingForHitl => {
                effects.push(emit(Event::TaskCancelled {
                    id: task.id,
                    project_id: task.project_id,
                    reason: format!("emergency_stop:{}", stop.reason),
                    by: CancelledBy::System,
                }));
            }
            TaskStatus::Working => {
                effects.push(Effect::SignalCancel {
                    task_id: task.id,
                    reason: format!("emergency_stop:{}", stop.reason),
                    by: CancelledBy::System,
                });
                effects.push(Effect::SetTimer {
                    id: TimerId::grace(&task.id),
                    duration: engine.config().cancel_grace,
                });
            }
            _ => {}
        }
    }
    for (run_id, project_id) in runs {
        effects.push(emit(Event::WorkflowPaused {
            run_id,
            project_id,
            reason: "emergency_stop".to_string(),
        }));
    }
    Ok(effects)
}
