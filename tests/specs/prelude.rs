// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test daemon for the specs.
//!
//! `TestDaemon` is the daemon's engine loop in miniature: events append
//! to a real WAL on disk, a drain pass applies each record, runs the
//! engine handlers, and feeds resulting events back. Dropping it and
//! calling `restart` rebuilds everything from the snapshot and WAL —
//! crash recovery, for real.

pub use std::sync::Arc;
pub use std::time::Duration;
pub use sw_core::{
    AgentKind, ApprovalAction, Clock, Event, EventRecord, FakeClock, Phase, Project, ProjectId,
    ProjectStatus, RunId, RunStatus, Task, TaskId, TaskStatus, WorkflowRun,
};
pub use sw_engine::{
    Dispatcher, Engine, EngineConfig, EventFabric, ExecutorRegistry, HitlGate, ScriptedExecutor,
    ScriptedStep, SubscribeScope,
};
pub use sw_storage::{load_snapshot, Checkpointer, MaterializedState, Wal};

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use tokio::sync::mpsc;

pub struct TestDaemon {
    pub state: Arc<Mutex<MaterializedState>>,
    pub wal: Arc<Mutex<Wal>>,
    pub engine: Engine<FakeClock>,
    pub fabric: EventFabric,
    pub clock: FakeClock,
    pub executor: Arc<ScriptedExecutor>,
    rx: mpsc::Receiver<Event>,
    wal_path: PathBuf,
    snapshot_path: PathBuf,
    _dir: Option<tempfile::TempDir>,
}

impl TestDaemon {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        Self::open(
            dir.path().join("events.wal"),
            dir.path().join("snapshot.zst"),
            Some(dir),
            FakeClock::new(),
        )
    }

    /// Rebuild from the same storage, as a restarted process would:
    /// snapshot first, WAL tail replayed, then recovery.
    pub fn restart(self) -> Self {
        let TestDaemon { wal_path, snapshot_path, _dir, clock, .. } = self;
        let mut daemon = Self::open(wal_path, snapshot_path, _dir, clock);
        daemon.drain();
        let effects = daemon.engine.recover();
        let events = daemon.engine.execute_all(effects).unwrap();
        for event in events {
            daemon.append(event);
        }
        daemon.drain();
        daemon
    }

    fn open(
        wal_path: PathBuf,
        snapshot_path: PathBuf,
        dir: Option<tempfile::TempDir>,
        clock: FakeClock,
    ) -> Self {
        let (state, processed_seq) = match load_snapshot(&snapshot_path).expect("snapshot") {
            Some(snapshot) => (snapshot.state, snapshot.seq),
            None => (MaterializedState::default(), 0),
        };
        let mut state = state;
        let mut wal = Wal::open(&wal_path, processed_seq).expect("wal");
        // Rebuild from the tail apply-only, exactly as the daemon's
        // startup does — handlers never re-run for history
        while let Some(record) = wal.next_unprocessed().expect("replay") {
            state.apply_record(&record);
            wal.mark_processed(record.seq);
        }
        let state = Arc::new(Mutex::new(state));
        let wal = Arc::new(Mutex::new(wal));

        let (event_tx, rx) = mpsc::channel(256);
        let executor = Arc::new(ScriptedExecutor::default());
        let config = EngineConfig::default();
        let dispatcher = Dispatcher::new(
            ExecutorRegistry::uniform(Arc::clone(&executor) as Arc<dyn sw_engine::AgentExecutor>),
            Arc::clone(&state),
            event_tx,
            config.clone(),
            clock.clone(),
        );
        let engine = Engine::new(
            Arc::clone(&state),
            dispatcher,
            HitlGate::default(),
            config,
            clock.clone(),
        );
        for def in sw_workflow::builtin_definitions() {
            engine.register_definition(def);
        }
        let fabric = EventFabric::new(Arc::clone(&state), 1024);

        Self {
            state,
            wal,
            engine,
            fabric,
            clock,
            executor,
            rx,
            wal_path,
            snapshot_path,
            _dir: dir,
        }
    }

    /// Append an event (durable) without processing it.
    pub fn append(&self, event: Event) -> EventRecord {
        let mut wal = self.wal.lock();
        let record = wal.append(self.clock.epoch_ms(), event).expect("append");
        wal.flush().expect("flush");
        record
    }

    /// Process every unhandled WAL record, exactly once each.
    pub fn drain(&mut self) {
        loop {
            let Some(record) = self.wal.lock().next_unprocessed().expect("read") else {
                break;
            };
            self.state.lock().apply_record(&record);
            match self.engine.handle_record(&record) {
                Ok(effects) => {
                    let events = self.engine.execute_all(effects).expect("execute");
                    for event in events {
                        self.append(event);
                    }
                }
                Err(e) => panic!("handler failed at seq {}: {e}", record.seq),
            }
            self.fabric.publish(&record);
            self.wal.lock().mark_processed(record.seq);
        }
        self.wal.lock().flush().expect("flush");
    }

    /// Append and process, like a command arriving over the bus.
    pub fn send(&mut self, event: Event) {
        self.append(event);
        self.drain();
    }

    /// Drain dispatcher events off the channel until it stays quiet.
    pub async fn pump(&mut self) {
        let mut queue: VecDeque<Event> = VecDeque::new();
        loop {
            match tokio::time::timeout(Duration::from_millis(250), self.rx.recv()).await {
                Ok(Some(event)) => queue.push_back(event),
                Ok(None) | Err(_) => {
                    if queue.is_empty() {
                        break;
                    }
                    while let Some(event) = queue.pop_front() {
                        self.send(event);
                    }
                }
            }
        }
    }

    /// Advance the fake clock and deliver any due timers.
    pub fn advance_and_fire(&mut self, duration: Duration) {
        self.clock.advance(duration);
        let scheduler = self.engine.scheduler();
        let fired = scheduler.lock().fired_timers(self.clock.now());
        for event in fired {
            self.send(event);
        }
    }

    /// Take a snapshot at the current processed seq and compact the WAL.
    pub fn checkpoint(&mut self) {
        let seq = self.wal.lock().processed_seq();
        let snapshot_state = self.state.lock().clone();
        Checkpointer::new(self.snapshot_path.clone())
            .checkpoint_sync(seq, &snapshot_state)
            .expect("checkpoint");
        self.wal.lock().truncate_before(seq).expect("truncate");
    }

    // ── Domain helpers ─────────────────────────────────────────────────

    pub fn create_project(&mut self, name: &str) -> Project {
        let project = Project {
            id: ProjectId::new(),
            name: name.to_string(),
            status: ProjectStatus::Active,
            current_phase: Phase::Intake,
            created_at_ms: self.clock.epoch_ms(),
        };
        self.send(Event::ProjectCreated { project: project.clone() });
        project
    }

    pub fn start_workflow(&mut self, project: &Project, definition_id: &str) -> RunId {
        let (_, hash) = self.engine.definition(definition_id).expect("definition");
        let now = self.clock.epoch_ms();
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
            created_at_ms: now,
            updated_at_ms: now,
        };
        let run_id = run.id;
        self.send(Event::WorkflowStarted { run });
        run_id
    }

    pub fn submit_task(&mut self, project: &Project, agent: AgentKind) -> TaskId {
        let task = Task {
            id: TaskId::new(),
            project_id: project.id,
            run_id: None,
            step_id: None,
            agent,
            status: TaskStatus::Pending,
            instructions: format!("{agent} work for {}", project.name),
            creates: None,
            context_ids: Vec::new(),
            output: None,
            error: None,
            attempt_count: 0,
            deadline_ms: None,
            heartbeat_ms: None,
            created_at_ms: self.clock.epoch_ms(),
            started_at_ms: None,
            completed_at_ms: None,
        };
        let id = task.id;
        self.send(Event::TaskCreated { task });
        id
    }

    pub fn sole_pending_approval(&self, project_id: &ProjectId) -> sw_core::Approval {
        let state = self.state.lock();
        let pending = state.pending_approvals(project_id);
        assert_eq!(pending.len(), 1, "expected exactly one pending approval");
        pending[0].clone()
    }

    pub fn respond(&mut self, approval: &sw_core::Approval, action: ApprovalAction) {
        self.send(Event::HitlResponded {
            id: approval.id,
            project_id: approval.project_id,
            action,
            user_text: None,
        });
    }

    pub fn task(&self, id: &TaskId) -> Task {
        self.state.lock().get_task(id.as_str()).expect("task").clone()
    }

    pub fn run(&self, id: &RunId) -> WorkflowRun {
        self.state.lock().runs.get(id.as_str()).expect("run").clone()
    }

    pub fn project(&self, id: &ProjectId) -> Project {
        self.state.lock().get_project(id.as_str()).expect("project").clone()
    }

    /// Audit kinds for a project, in seq order.
    pub fn audit_kinds(&self, project_id: &ProjectId) -> Vec<String> {
        self.state
            .lock()
            .audit
            .iter()
            .filter(|r| r.project_id == Some(*project_id))
            .map(|r| r.kind().to_string())
            .collect()
    }
}
