// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The engine runtime: events in, effects out.
//!
//! `handle_record` is invoked by the daemon loop exactly once per
//! persisted event, after the reducers have applied it. Handlers read the
//! materialized state, decide, and return effects; the loop executes
//! those through [`Engine::execute`], feeding any resulting events back
//! into the bus. Workflow advancement, the HITL gate, retries, and
//! recovery all live here.

mod hitl;
mod recovery;
mod task;
mod workflow;

use crate::config::EngineConfig;
use crate::dispatch::Dispatcher;
use crate::error::RuntimeError;
use crate::gate::HitlGate;
use crate::scheduler::Scheduler;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use sw_core::{
    Clock, Effect, Event, EventRecord, Project, ProjectId, Task, TaskStatus, TimerId,
};
use sw_storage::MaterializedState;
use sw_workflow::{definition_hash, WorkflowDef};

/// The orchestration engine.
pub struct Engine<C: Clock> {
    state: Arc<Mutex<MaterializedState>>,
    definitions: Mutex<HashMap<String, (WorkflowDef, String)>>,
    dispatcher: Dispatcher<C>,
    scheduler: Arc<Mutex<Scheduler>>,
    gate: HitlGate,
    config: EngineConfig,
    clock: C,
}

impl<C: Clock + 'static> Engine<C> {
    pub fn new(
        state: Arc<Mutex<MaterializedState>>,
        dispatcher: Dispatcher<C>,
        gate: HitlGate,
        config: EngineConfig,
        clock: C,
    ) -> Self {
        Self {
            state,
            definitions: Mutex::new(HashMap::new()),
            dispatcher,
            scheduler: Arc::new(Mutex::new(Scheduler::new())),
            gate,
            config,
            clock,
        }
    }

    /// Make a workflow definition startable.
    pub fn register_definition(&self, def: WorkflowDef) {
        let hash = definition_hash(&def);
        self.definitions.lock().insert(def.name.clone(), (def, hash));
    }

    /// Look up a registered definition and its content hash.
    pub fn definition(&self, name: &str) -> Option<(WorkflowDef, String)> {
        self.definitions.lock().get(name).cloned()
    }

    pub fn definition_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.definitions.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn state(&self) -> Arc<Mutex<MaterializedState>> {
        Arc::clone(&self.state)
    }

    pub fn scheduler(&self) -> Arc<Mutex<Scheduler>> {
        Arc::clone(&self.scheduler)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Effects that arm the periodic sweeps. Run once at startup.
    pub fn bootstrap_effects(&self) -> Vec<Effect> {
        vec![
            Effect::SetTimer { id: TimerId::hitl_sweep(), duration: self.config.sweep_interval },
            Effect::SetTimer { id: TimerId::stall_scan(), duration: self.config.sweep_interval },
        ]
    }

    /// Startup recovery: orphaned and stranded work. See the recovery
    /// module for the rules.
    pub fn recover(&self) -> Vec<Effect> {
        recovery::recover(self)
    }

    /// React to one persisted event. Called exactly once per record,
    /// after state application.
    pub fn handle_record(&self, record: &EventRecord) -> Result<Vec<Effect>, RuntimeError> {
        match &record.event {
            Event::WorkflowStarted { run } => {
                workflow::drive(self, run.id, run.current_step_index)
            }

            Event::TaskCreated { task } => task::handle_created(self, task),
            Event::TaskProgress { id, attempt, error, .. } => {
                task::handle_progress(self, id, *attempt, error.as_deref())
            }
            Event::TaskResumed { id, .. } => task::handle_resumed(self, id),
            Event::TaskCancelRequested { id, reason, by, .. } => {
                task::handle_cancel_requested(self, id, reason, *by)
            }
            Event::TaskCompleted { id, .. } => workflow::handle_task_completed(self, id),
            Event::TaskFailed { id, error, .. } => {
                workflow::handle_task_terminal(self, id, error, false)
            }
            Event::TaskCancelled { id, reason, .. } => {
                workflow::handle_task_terminal(self, id, reason, true)
            }

            Event::HitlResponded { id, action, user_text, .. } => {
                hitl::handle_response(self, record.seq, id, *action, user_text.as_deref())
            }
            Event::EmergencyStopActivated { stop } => hitl::handle_stop_activated(self, stop),

            Event::TimerFired { id } => self.handle_timer(id),

            // Everything else is a pure state/audit record
            _ => Ok(Vec::new()),
        }
    }

    /// Execute a single effect with tracing.
    ///
    /// Returns an optional event that should be fed back into the event loop.
    pub fn execute(&self, effect: Effect) -> Result<Option<Event>, RuntimeError> {
        let info: String =
            effect.fields().iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(" ");
        let op = effect.name();
        if effect.verbose() {
            tracing::info!("executing effect={} {}", op, info);
        } else {
            tracing::debug!("executing effect={} {}", op, info);
        }

        match effect {
            Effect::Emit { event } => Ok(Some(event)),
            Effect::ExecuteTask { task, attempt } => {
                self.dispatcher.execute(task, attempt);
                Ok(None)
            }
            Effect::SignalCancel { task_id, reason, by } => {
                self.dispatcher.signal_cancel(&task_id, reason, by);
                Ok(None)
            }
            Effect::AbandonTask { task_id } => {
                self.dispatcher.abandon(&task_id);
                Ok(None)
            }
            Effect::SetTimer { id, duration } => {
                self.scheduler.lock().set_timer(id, duration, self.clock.now());
                Ok(None)
            }
            Effect::CancelTimer { id } => {
                self.scheduler.lock().cancel_timer(&id);
                Ok(None)
            }
        }
    }

    /// Execute multiple effects in order.
    ///
    /// Returns the events produced (to be appended to the bus).
    pub fn execute_all(&self, effects: Vec<Effect>) -> Result<Vec<Event>, RuntimeError> {
        let mut events = Vec::new();
        for effect in effects {
            if let Some(event) = self.execute(effect)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    // ── Command admission (called from the API surface) ─────────────────

    /// Look up a project that must exist and be non-terminal.
    pub fn require_active_project(&self, project_id: &str) -> Result<Project, RuntimeError> {
        let project = self
            .state
            .lock()
            .get_project(project_id)
            .cloned()
            .ok_or_else(|| RuntimeError::ProjectNotFound(project_id.to_string()))?;
        if project.is_terminal() {
            return Err(RuntimeError::ProjectTerminal(project_id.to_string()));
        }
        Ok(project)
    }

    /// Admission check for a new task submission: emergency stop and
    /// queue high-water mark.
    pub fn check_admission(&self, project_id: &ProjectId) -> Result<(), RuntimeError> {
        let state = self.state.lock();
        if state.active_stop_for(project_id).is_some() {
            return Err(RuntimeError::Halted(project_id.to_string()));
        }
        let pending = state
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .count();
        if pending >= self.config.queue_high_water {
            return Err(RuntimeError::QueueFull);
        }
        Ok(())
    }

    /// Cancellation admission: resolves the task and rejects terminal ones.
    pub fn check_cancel(&self, task_id: &str) -> Result<Task, RuntimeError> {
        let task = self
            .state
            .lock()
            .get_task(task_id)
            .cloned()
            .ok_or_else(|| RuntimeError::TaskNotFound(task_id.to_string()))?;
        if task.is_terminal() {
            return Err(RuntimeError::AlreadyTerminal(task_id.to_string()));
        }
        Ok(task)
    }

    // ── Timers ──────────────────────────────────────────────────────────

    fn handle_timer(&self, id: &TimerId) -> Result<Vec<Effect>, RuntimeError> {
        if let Some((task_id, attempt)) = id.parse_retry() {
            return task::handle_retry_due(self, &task_id, attempt);
        }
        if let Some(task_id) = id.parse_grace() {
            return task::handle_grace_expired(self, &task_id);
        }
        if *id == TimerId::hitl_sweep() {
            let mut effects = hitl::expire_stale(self);
            effects.push(Effect::SetTimer {
                id: TimerId::hitl_sweep(),
                duration: self.config.sweep_interval,
            });
            return Ok(effects);
        }
        if *id == TimerId::stall_scan() {
            let mut effects = task::scan_stalled(self);
            effects.push(Effect::SetTimer {
                id: TimerId::stall_scan(),
                duration: self.config.sweep_interval,
            });
            return Ok(effects);
        }
        tracing::debug!(timer = %id, "unrecognized timer, ignoring");
        Ok(Vec::new())
    }
}

#[cfg(test)]
#[path = "../runtime_tests/mod.rs"]
mod tests;
