// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The workflow driver: interprets a definition and advances a run.
//!
//! `drive` walks steps from an explicit index until it blocks — on a
//! phase gate, on submitted agent tasks, or on completion. Re-entry
//! always comes with an explicit index from the caller (join, approval,
//! recovery), never from re-reading a possibly mid-batch step pointer.

use super::{task, Engine};
use crate::error::RuntimeError;
use sw_core::{
    ApprovalKind, ApprovalStatus, Clock, Effect, Event, Phase, Project, RunId, Task, TaskId,
    TaskStatus, WorkflowRun,
};
use sw_workflow::{parse_condition, ConditionScope, StepDef, WorkflowDef};

/// Why a step could not proceed.
enum StepBlock {
    /// Condition false (or unevaluable) on an optional step
    Skip,
    /// Condition false (or unevaluable) on a required step
    FailWorkflow(String),
    /// A `requires` artifact type has no artifact
    MissingInput(String),
}

/// Advance a run from `from_index` until it blocks.
pub(super) fn drive<C: Clock + 'static>(
    engine: &Engine<C>,
    run_id: RunId,
    from_index: usize,
) -> Result<Vec<Effect>, RuntimeError> {
    let (run, project) = {
        let state = engine.state();
        let state = state.lock();
        let Some(run) = state.runs.get(run_id.as_str()).cloned() else {
            return Ok(Vec::new());
        };
        let Some(project) = state.get_project(run.project_id.as_str()).cloned() else {
            return Ok(Vec::new());
        };
        (run, project)
    };
    if run.is_terminal() {
        return Ok(Vec::new());
    }

    let Some((def, _hash)) = engine.definition(&run.definition_id) else {
        return Ok(vec![emit(Event::WorkflowFailed {
            run_id,
            project_id: run.project_id,
            error: format!("definition not found: {}", run.definition_id),
        })]);
    };

    let mut effects = Vec::new();
    let mut phase = project.current_phase;
    let mut idx = from_index;

    loop {
        if idx >= def.steps.len() {
            effects.push(emit(Event::WorkflowCompleted { run_id, project_id: run.project_id }));
            return Ok(effects);
        }
        let Some((group, next)) = def.group_at(idx) else {
            return Ok(effects);
        };

        // Phase marker: entering a step in a new phase flips the project
        if let Some(step_phase) = group[0].phase {
            if step_phase != phase {
                phase = step_phase;
                effects.push(emit(Event::WorkflowPhaseChanged {
                    run_id,
                    project_id: run.project_id,
                    phase,
                }));
            }
        }

        if group.len() == 1 && group[0].is_gate() {
            let step = &group[0];
            match check_step(engine, &run, step, phase) {
                Some(StepBlock::Skip) => {
                    effects.push(step_completed(&run, step, idx, true));
                    idx = next;
                    continue;
                }
                Some(StepBlock::FailWorkflow(error)) => {
                    effects.push(emit(Event::WorkflowFailed {
                        run_id,
                        project_id: run.project_id,
                        error,
                    }));
                    return Ok(effects);
                }
                Some(StepBlock::MissingInput(_)) | None => {}
            }

            if engine.state().lock().active_stop_for(&run.project_id).is_some() {
                effects.push(emit(Event::WorkflowPaused {
                    run_id,
                    project_id: run.project_id,
                    reason: "emergency_stop".to_string(),
                }));
                return Ok(effects);
            }

            effects.push(emit(Event::HitlRequested {
                approval: gate_approval(engine, &run, step, idx),
            }));
            effects.push(emit(Event::WorkflowPaused {
                run_id,
                project_id: run.project_id,
                reason: format!("phase_gate:{}", step.id),
            }));
            return Ok(effects);
        }

        // Agent step group: submit every runnable member, then wait
        let mut submitted = 0usize;
        for (offset, step) in group.iter().enumerate() {
            let step_index = idx + offset;
            match check_step(engine, &run, step, phase) {
                Some(StepBlock::Skip) => {
                    effects.push(step_completed(&run, step, step_index, true));
                    continue;
                }
                Some(StepBlock::FailWorkflow(error)) => {
                    effects.push(emit(Event::WorkflowFailed {
                        run_id,
                        project_id: run.project_id,
                        error,
                    }));
                    return Ok(effects);
                }
                Some(StepBlock::MissingInput(artifact_type)) => {
                    effects.extend(escalate_missing_input(engine, &run, step, step_index, &artifact_type));
                    return Ok(effects);
                }
                None => {}
            }

            effects.push(emit(Event::WorkflowStepStarted {
                run_id,
                project_id: run.project_id,
                step_id: step.id.clone(),
                step_index,
            }));
            let new_task = build_task(engine, &run, &project, step);
            effects.push(emit(Event::TaskCreated { task: new_task.clone() }));
            let step_approval = step.approval.then_some(ApprovalKind::PreExecution);
            effects.extend(task::admit(engine, &new_task, step_approval));
            submitted += 1;
        }

        if submitted == 0 {
            // Whole group skipped
            idx = next;
            continue;
        }
        return Ok(effects);
    }
}

/// Join and failure handling when a run-owned task reaches `completed`.
pub(super) fn handle_task_completed<C: Clock + 'static>(
    engine: &Engine<C>,
    task_id: &TaskId,
) -> Result<Vec<Effect>, RuntimeError> {
    let Some(task) = engine.state().lock().get_task(task_id.as_str()).cloned() else {
        return Ok(Vec::new());
    };
    let Some(run_id) = task.run_id else {
        return Ok(task::dequeue_next(engine, &task.project_id));
    };
    let mut effects = join_group(engine, run_id, &task)?;
    effects.extend(task::dequeue_next(engine, &task.project_id));
    Ok(effects)
}

/// Workflow-level reaction to a run-owned task failing or being
/// cancelled: retry the step, or escalate to a human.
pub(super) fn handle_task_terminal<C: Clock + 'static>(
    engine: &Engine<C>,
    task_id: &TaskId,
    error: &str,
    cancelled: bool,
) -> Result<Vec<Effect>, RuntimeError> {
    let Some(task) = engine.state().lock().get_task(task_id.as_str()).cloned() else {
        return Ok(Vec::new());
    };
    let mut effects = vec![
        Effect::CancelTimer { id: sw_core::TimerId::grace(&task.id) },
        Effect::CancelTimer {
            id: sw_core::TimerId::retry(&task.id, task.attempt_count + 1),
        },
    ];
    effects.extend(task::dequeue_next(engine, &task.project_id));

    let Some(run_id) = task.run_id else {
        return Ok(effects);
    };
    let Some(run) = engine.state().lock().runs.get(run_id.as_str()).cloned() else {
        return Ok(effects);
    };
    if run.is_terminal() || run.status == sw_core::RunStatus::Paused {
        // Rejections, emergency stops, and expiry sweeps pause the run
        // themselves; nothing more to decide here
        return Ok(effects);
    }
    if cancelled && error.contains("emergency_stop") {
        return Ok(effects);
    }

    let Some((def, _)) = engine.definition(&run.definition_id) else {
        effects.push(emit(Event::WorkflowFailed {
            run_id,
            project_id: run.project_id,
            error: format!("definition not found: {}", run.definition_id),
        }));
        return Ok(effects);
    };
    let Some((step, step_index)) = step_of(&def, &task) else {
        return Ok(effects);
    };

    if run.step_retries < engine.config().workflow_retry_limit {
        effects.extend(retry_step(engine, &run, step, step_index, &task, None));
        return Ok(effects);
    }

    // Retries exhausted: ask the human — approve retries, modify skips
    // (optional steps), reject aborts
    effects.push(emit(Event::HitlRequested {
        approval: escalation_approval(engine, &run, step, step_index, &task, error),
    }));
    effects.push(emit(Event::WorkflowPaused {
        run_id,
        project_id: run.project_id,
        reason: format!("step_failure:{}", step.id),
    }));
    Ok(effects)
}

/// Re-create the failed step's task and admit it.
pub(super) fn retry_step<C: Clock + 'static>(
    engine: &Engine<C>,
    run: &WorkflowRun,
    step: &StepDef,
    _step_index: usize,
    replaced: &Task,
    guidance: Option<sw_core::ArtifactId>,
) -> Vec<Effect> {
    let Some(project) = engine.state().lock().get_project(run.project_id.as_str()).cloned()
    else {
        return Vec::new();
    };
    let mut effects = vec![emit(Event::WorkflowStepRetried {
        run_id: run.id,
        project_id: run.project_id,
        step_id: step.id.clone(),
        retries: run.step_retries + 1,
        replaced_task: replaced.id,
    })];
    let mut new_task = build_task(engine, run, &project, step);
    if let Some(guidance) = guidance {
        new_task.context_ids.push(guidance);
    }
    effects.push(emit(Event::TaskCreated { task: new_task.clone() }));
    let step_approval = step.approval.then_some(ApprovalKind::PreExecution);
    effects.extend(task::admit(engine, &new_task, step_approval));
    effects
}

/// All group members terminal and successful → commit the step(s) and
/// keep driving.
fn join_group<C: Clock + 'static>(
    engine: &Engine<C>,
    run_id: RunId,
    task: &Task,
) -> Result<Vec<Effect>, RuntimeError> {
    let (run, group_tasks) = {
        let state = engine.state();
        let state = state.lock();
        let Some(run) = state.runs.get(run_id.as_str()).cloned() else {
            return Ok(Vec::new());
        };
        let tasks: Vec<Task> = run
            .active_tasks
            .iter()
            .filter_map(|id| state.tasks.get(id.as_str()).cloned())
            .collect();
        (run, tasks)
    };
    if run.is_terminal() {
        return Ok(Vec::new());
    }

    if group_tasks.iter().any(|t| !t.is_terminal()) {
        return Ok(Vec::new());
    }
    if group_tasks.iter().any(|t| t.status != TaskStatus::Completed) {
        // Failure handling runs off the failing task's own event
        return Ok(Vec::new());
    }

    let Some((def, _)) = engine.definition(&run.definition_id) else {
        return Ok(vec![emit(Event::WorkflowFailed {
            run_id,
            project_id: run.project_id,
            error: format!("definition not found: {}", run.definition_id),
        })]);
    };
    let Some((_, anchor_index)) = step_of(&def, task) else {
        return Ok(Vec::new());
    };
    let Some((start, end)) = def.group_bounds(anchor_index) else {
        return Ok(Vec::new());
    };

    let mut effects = Vec::new();
    for index in start..end {
        let step = &def.steps[index];
        if group_tasks.iter().any(|t| t.step_id.as_deref() == Some(step.id.as_str())) {
            effects.push(step_completed(&run, step, index, false));
        }
    }
    effects.extend(drive(engine, run_id, end)?);
    Ok(effects)
}

// ── Helpers ─────────────────────────────────────────────────────────────

pub(super) fn emit(event: Event) -> Effect {
    Effect::Emit { event }
}

fn step_completed(run: &WorkflowRun, step: &StepDef, index: usize, skipped: bool) -> Effect {
    emit(Event::WorkflowStepCompleted {
        run_id: run.id,
        project_id: run.project_id,
        step_id: step.id.clone(),
        step_index: index,
        skipped,
    })
}

/// Locate a task's step in the definition.
pub(super) fn step_of<'a>(def: &'a WorkflowDef, task: &Task) -> Option<(&'a StepDef, usize)> {
    let step_id = task.step_id.as_deref()?;
    def.steps
        .iter()
        .position(|s| s.id == step_id)
        .map(|index| (&def.steps[index], index))
}

/// Condition and input checks for a step about to run.
fn check_step<C: Clock + 'static>(
    engine: &Engine<C>,
    run: &WorkflowRun,
    step: &StepDef,
    phase: Phase,
) -> Option<StepBlock> {
    if let Some(condition) = &step.condition {
        let state = engine.state();
        let state = state.lock();
        let scope = StateScope { state: &state, run, phase };
        let verdict = parse_condition(condition)
            .map_err(|e| e.to_string())
            .and_then(|expr| expr.eval(&scope).map_err(|e| e.to_string()));
        match verdict {
            Ok(true) => {}
            Ok(false) | Err(_) if step.optional => return Some(StepBlock::Skip),
            Ok(false) => {
                return Some(StepBlock::FailWorkflow(format!(
                    "condition false for required step {}",
                    step.id
                )))
            }
            Err(e) => {
                return Some(StepBlock::FailWorkflow(format!(
                    "condition unevaluable for required step {}: {e}",
                    step.id
                )))
            }
        }
    }

    if step.is_gate() {
        return None;
    }
    for artifact_type in &step.requires {
        let state = engine.state();
        let state = state.lock();
        let in_snapshot = run.snapshot_artifact(artifact_type).is_some();
        let in_store = state.latest_artifact(&run.project_id, artifact_type).is_some();
        if !in_snapshot && !in_store {
            return Some(StepBlock::MissingInput(artifact_type.clone()));
        }
    }
    None
}

/// Resolve `requires` into concrete artifact ids: the run snapshot wins,
/// then the newest artifact of the type in the project.
fn resolve_context<C: Clock + 'static>(
    engine: &Engine<C>,
    run: &WorkflowRun,
    step: &StepDef,
) -> Vec<sw_core::ArtifactId> {
    let state = engine.state();
    let state = state.lock();
    step.requires
        .iter()
        .filter_map(|artifact_type| {
            run.snapshot_artifact(artifact_type)
                .copied()
                .or_else(|| state.latest_artifact(&run.project_id, artifact_type).map(|a| a.id))
        })
        .collect()
}

fn build_task<C: Clock + 'static>(
    engine: &Engine<C>,
    run: &WorkflowRun,
    project: &Project,
    step: &StepDef,
) -> Task {
    Task {
        id: TaskId::new(),
        project_id: run.project_id,
        run_id: Some(run.id),
        step_id: Some(step.id.clone()),
        // Gates never reach here; the driver handles them separately
        agent: step.agent.unwrap_or(sw_core::AgentKind::Analyst),
        status: TaskStatus::Pending,
        instructions: step.build_instructions(&project.name),
        creates: step.creates.clone(),
        context_ids: resolve_context(engine, run, step),
        output: None,
        error: None,
        attempt_count: 0,
        deadline_ms: None,
        heartbeat_ms: None,
        created_at_ms: engine.clock().epoch_ms(),
        started_at_ms: None,
        completed_at_ms: None,
    }
}

fn gate_approval<C: Clock + 'static>(
    engine: &Engine<C>,
    run: &WorkflowRun,
    step: &StepDef,
    step_index: usize,
) -> sw_core::Approval {
    let now = engine.clock().epoch_ms();
    sw_core::Approval {
        id: sw_core::ApprovalId::new(),
        project_id: run.project_id,
        task_id: None,
        agent: step.agent.unwrap_or(sw_core::AgentKind::Analyst),
        kind: ApprovalKind::PhaseGate,
        request_payload: serde_json::json!({
            "gate": true,
            "run_id": run.id,
            "step_id": step.id,
            "step_index": step_index,
            "creates": step.creates,
            "phase": step.phase.map(|p| p.to_string()),
        }),
        status: ApprovalStatus::Pending,
        action: None,
        user_response: None,
        created_at_ms: now,
        expires_at_ms: engine.config().approval_ttl.map(|ttl| now + ttl.as_millis() as u64),
        responded_at_ms: None,
        resolution_seq: None,
    }
}

fn escalation_approval<C: Clock + 'static>(
    engine: &Engine<C>,
    run: &WorkflowRun,
    step: &StepDef,
    step_index: usize,
    task: &Task,
    error: &str,
) -> sw_core::Approval {
    let now = engine.clock().epoch_ms();
    sw_core::Approval {
        id: sw_core::ApprovalId::new(),
        project_id: run.project_id,
        task_id: Some(task.id),
        agent: task.agent,
        kind: ApprovalKind::PreExecution,
        request_payload: serde_json::json!({
            "escalation": "step_failure",
            "run_id": run.id,
            "step_id": step.id,
            "step_index": step_index,
            "error": error,
            "optional": step.optional,
        }),
        status: ApprovalStatus::Pending,
        action: None,
        user_response: None,
        created_at_ms: now,
        expires_at_ms: engine.config().approval_ttl.map(|ttl| now + ttl.as_millis() as u64),
        responded_at_ms: None,
        resolution_seq: None,
    }
}

fn escalate_missing_input<C: Clock + 'static>(
    engine: &Engine<C>,
    run: &WorkflowRun,
    step: &StepDef,
    step_index: usize,
    artifact_type: &str,
) -> Vec<Effect> {
    let now = engine.clock().epoch_ms();
    let approval = sw_core::Approval {
        id: sw_core::ApprovalId::new(),
        project_id: run.project_id,
        task_id: None,
        agent: step.agent.unwrap_or(sw_core::AgentKind::Analyst),
        kind: ApprovalKind::PreExecution,
        request_payload: serde_json::json!({
            "escalation": "missing_input",
            "run_id": run.id,
            "step_id": step.id,
            "step_index": step_index,
            "error": format!("missing_input:{artifact_type}"),
            "optional": step.optional,
        }),
        status: ApprovalStatus::Pending,
        action: None,
        user_response: None,
        created_at_ms: now,
        expires_at_ms: engine.config().approval_ttl.map(|ttl| now + ttl.as_millis() as u64),
        responded_at_ms: None,
        resolution_seq: None,
    };
    vec![
        emit(Event::HitlRequested { approval }),
        emit(Event::WorkflowPaused {
            run_id: run.id,
            project_id: run.project_id,
            reason: format!("missing_input:{}", step.id),
        }),
    ]
}

/// Condition scope over the materialized state, preferring the run's
/// committed snapshot for artifact lookups.
struct StateScope<'a> {
    state: &'a sw_storage::MaterializedState,
    run: &'a WorkflowRun,
    phase: Phase,
}

impl ConditionScope for StateScope<'_> {
    fn phase(&self) -> Phase {
        self.phase
    }

    fn artifact_content(&self, artifact_type: &str) -> Option<serde_json::Value> {
        if let Some(id) = self.run.snapshot_artifact(artifact_type) {
            if let Some(artifact) = self.state.artifacts.get(id.as_str()) {
                return Some(artifact.content.clone());
            }
        }
        self.state
            .latest_artifact(&self.run.project_id, artifact_type)
            .map(|a| a.content.clone())
    }
}
