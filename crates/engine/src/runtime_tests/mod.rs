// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime tests drive the engine the way the daemon loop does: apply a
//! record, run the handler, execute the effects, feed resulting events
//! back in. Dispatcher events are pumped from the channel between steps.

mod retry;
mod stops;
mod workflows;

use super::Engine;
use crate::config::EngineConfig;
use crate::dispatch::Dispatcher;
use crate::executor::{ExecutorRegistry, ScriptedExecutor, ScriptedStep};
use crate::gate::HitlGate;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use sw_core::test_support::sample_project;
use sw_core::{
    AgentKind, ApprovalAction, Clock, Event, EventRecord, FakeClock, Phase, Project, ProjectId,
    RunId, RunStatus, Task, TaskStatus, WorkflowRun,
};
use sw_storage::MaterializedState;
use tokio::sync::mpsc;

pub(crate) struct Harness {
    pub engine: Engine<FakeClock>,
    pub clock: FakeClock,
    rx: mpsc::Receiver<Event>,
    seq: u64,
    pub log: Vec<EventRecord>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_script(Vec::new())
    }

    pub fn with_script(script: Vec<ScriptedStep>) -> Self {
        Self::build(script, EngineConfig::default())
    }

    pub fn with_config(script: Vec<ScriptedStep>, config: EngineConfig) -> Self {
        Self::build(script, config)
    }

    fn build(script: Vec<ScriptedStep>, config: EngineConfig) -> Self {
        let state = Arc::new(Mutex::new(MaterializedState::default()));
        let clock = FakeClock::new();
        let (event_tx, rx) = mpsc::channel(256);
        let registry =
            ExecutorRegistry::uniform(Arc::new(ScriptedExecutor::new(script)));
        let dispatcher = Dispatcher::new(
            registry,
            Arc::clone(&state),
            event_tx,
            config.clone(),
            clock.clone(),
        );
        let engine =
            Engine::new(state, dispatcher, HitlGate::default(), config, clock.clone());
        for def in sw_workflow::builtin_definitions() {
            engine.register_definition(def);
        }
        Self { engine, clock, rx, seq: 0, log: Vec::new() }
    }

    /// Process one event and everything it cascades into, synchronously.
    pub fn send(&mut self, event: Event) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            self.seq += 1;
            let record = EventRecord::new(self.seq, self.clock.epoch_ms(), event);
            self.engine.state().lock().apply_record(&record);
            let effects = self.engine.handle_record(&record).unwrap();
            self.log.push(record);
            for event in self.engine.execute_all(effects).unwrap() {
                queue.push_back(event);
            }
        }
    }

    /// Drain events the dispatcher produced on the channel, processing
    /// each. Returns once the channel stays quiet.
    pub async fn pump(&mut self) {
        loop {
            match tokio::time::timeout(Duration::from_millis(250), self.rx.recv()).await {
                Ok(Some(event)) => self.send(event),
                Ok(None) | Err(_) => break,
            }
        }
    }

    /// Advance the fake clock and deliver any due scheduler timers.
    pub fn advance_and_fire(&mut self, duration: Duration) {
        self.clock.advance(duration);
        let scheduler = self.engine.scheduler();
        let fired = scheduler.lock().fired_timers(self.clock.now());
        for event in fired {
            self.send(event);
        }
    }

    /// Event kinds observed so far, in order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.log.iter().map(|r| r.kind()).collect()
    }

    pub fn kinds_for_project(&self, project_id: &ProjectId) -> Vec<&'static str> {
        self.log
            .iter()
            .filter(|r| r.project_id == Some(*project_id))
            .map(|r| r.kind())
            .collect()
    }

    // ── Fixtures ────────────────────────────────────────────────────────

    pub fn create_project(&mut self, name: &str) -> Project {
        let project = Project {
            id: ProjectId::new(),
            name: name.to_string(),
            ..sample_project("prj-ignored", name)
        };
        self.send(Event::ProjectCreated { project: project.clone() });
        project
    }

    pub fn start_workflow(&mut self, project: &Project, definition_id: &str) -> RunId {
        let (_, hash) = self.engine.definition(definition_id).unwrap();
        let run = WorkflowRun {
            id: RunId::new(),
            project_id: project.id,
            definition_id: definition_id.to_string(),
            definition_hash: hash,
            status: RunStatus::Pending,
            current_step_index: 0,
            context_snapshot: Default::default(),
            step_retries: 0,
            active_tasks: Vec::new(),
            paused_reason: None,
            error: None,
            created_at_ms: self.clock.epoch_ms(),
            updated_at_ms: self.clock.epoch_ms(),
        };
        let run_id = run.id;
        self.send(Event::WorkflowStarted { run });
        run_id
    }

    pub fn submit_task(&mut self, project: &Project, agent: AgentKind) -> sw_core::TaskId {
        let task = Task::builder()
            .project_id(project.id)
            .agent(agent)
            .created_at_ms(self.clock.epoch_ms())
            .build();
        let id = task.id;
        self.send(Event::TaskCreated { task });
        id
    }

    pub fn respond(&mut self, approval_id: sw_core::ApprovalId, action: ApprovalAction) {
        self.respond_with(approval_id, action, None);
    }

    pub fn respond_with(
        &mut self,
        approval_id: sw_core::ApprovalId,
        action: ApprovalAction,
        text: Option<&str>,
    ) {
        let project_id = self
            .engine
            .state()
            .lock()
            .get_approval(approval_id.as_str())
            .unwrap()
            .project_id;
        self.send(Event::HitlResponded {
            id: approval_id,
            project_id,
            action,
            user_text: text.map(str::to_string),
        });
    }

    pub fn sole_pending_approval(&self, project_id: &ProjectId) -> sw_core::Approval {
        let state = self.engine.state();
        let state = state.lock();
        let pending = state.pending_approvals(project_id);
        assert_eq!(pending.len(), 1, "expected exactly one pending approval");
        pending[0].clone()
    }

    pub fn task(&self, id: &sw_core::TaskId) -> Task {
        self.engine.state().lock().get_task(id.as_str()).unwrap().clone()
    }

    pub fn run(&self, id: &RunId) -> WorkflowRun {
        self.engine.state().lock().runs.get(id.as_str()).unwrap().clone()
    }

    pub fn project(&self, id: &ProjectId) -> Project {
        self.engine.state().lock().get_project(id.as_str()).unwrap().clone()
    }
}

#[tokio::test(start_paused = true)]
async fn adhoc_task_executes_and_completes() {
    let mut h = Harness::new();
    let project = h.create_project("Todo App");
    let task_id = h.submit_task(&project, AgentKind::Analyst);
    h.pump().await;

    let task = h.task(&task_id);
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.attempt_count, 1);

    let kinds = h.kinds();
    let expected = ["task.created", "task.started", "artifact.created", "task.completed"];
    for kind in expected {
        assert!(kinds.contains(&kind), "missing {kind} in {kinds:?}");
    }

    // Completed task produced an artifact
    let state = h.engine.state();
    let state = state.lock();
    assert_eq!(state.artifacts.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn completed_tasks_carry_artifacts_and_failures_carry_errors() {
    let mut h =
        Harness::with_script(vec![ScriptedStep::Reject("not my job".to_string())]);
    let project = h.create_project("Todo App");
    let task_id = h.submit_task(&project, AgentKind::Coder);
    h.pump().await;

    let task = h.task(&task_id);
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error.as_deref(), Some("rejected: not my job"));
}

#[tokio::test(start_paused = true)]
async fn adhoc_tasks_run_sequentially_per_project() {
    let mut h = Harness::new();
    let project = h.create_project("Todo App");
    let other = h.create_project("Elsewhere");

    // Submitted back to back: the second queues behind the first
    let t1 = h.submit_task(&project, AgentKind::Analyst);
    let t2 = h.submit_task(&project, AgentKind::Coder);
    let elsewhere = h.submit_task(&other, AgentKind::Analyst);
    h.pump().await;

    assert_eq!(h.task(&t1).status, TaskStatus::Completed);
    assert_eq!(h.task(&t2).status, TaskStatus::Completed);
    assert_eq!(h.task(&elsewhere).status, TaskStatus::Completed);

    // Within the project, starts follow completion order
    let project_events: Vec<(&str, Option<sw_core::TaskId>)> = h
        .log
        .iter()
        .filter(|r| r.project_id == Some(project.id))
        .map(|r| (r.kind(), r.event.task_id()))
        .collect();
    let t1_completed = project_events
        .iter()
        .position(|(k, id)| *k == "task.completed" && *id == Some(t1))
        .unwrap();
    let t2_started = project_events
        .iter()
        .position(|(k, id)| *k == "task.started" && *id == Some(t2))
        .unwrap();
    assert!(t1_completed < t2_started, "{project_events:?}");
}

#[tokio::test(start_paused = true)]
async fn phase_is_tracked_on_the_project() {
    let mut h = Harness::new();
    let project = h.create_project("Todo App");
    assert_eq!(h.project(&project.id).current_phase, Phase::Intake);

    h.start_workflow(&project, "greenfield-fullstack");
    assert_eq!(h.project(&project.id).current_phase, Phase::Analyze);
}
