// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup: acquire the lock, load the snapshot, open the WAL,
//! assemble the engine, and bind the listener. WAL backlog processing
//! and recovery run in the engine loop once it starts.

use super::{Config, DaemonState, LifecycleError};
use crate::event_bus::EventBus;
use fs2::FileExt;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use sw_core::{Event, SystemClock};
use sw_engine::{
    Dispatcher, EchoExecutor, Engine, EventFabric, ExecutorRegistry, HitlGate, PhasePolicy,
};
use sw_storage::{load_snapshot, ContextStore, MaterializedState, SchemaRegistry, Wal};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Notify};
use tracing::info;

/// Result of daemon startup.
pub struct StartupResult {
    /// The daemon state for the engine loop
    pub daemon: DaemonState,
    /// Dispatcher-side events for the engine loop
    pub event_rx: mpsc::Receiver<Event>,
    /// Bound HTTP listener
    pub listener: TcpListener,
}

/// Start with the stub echo executor (local runs without a model).
pub async fn startup(config: Config) -> Result<StartupResult, LifecycleError> {
    startup_with_registry(config, ExecutorRegistry::uniform(Arc::new(EchoExecutor))).await
}

/// Start with an injected executor registry.
pub async fn startup_with_registry(
    config: Config,
    registry: ExecutorRegistry,
) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    // Exclusive lock guards against a second daemon on the same state dir
    let mut lock_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    writeln!(lock_file, "{}", std::process::id())?;

    // Snapshot first, then replay the WAL tail past it
    let (state, processed_seq) = match load_snapshot(&config.snapshot_path)? {
        Some(snapshot) => {
            info!(seq = snapshot.seq, "loaded snapshot");
            (snapshot.state, snapshot.seq)
        }
        None => (MaterializedState::default(), 0),
    };
    let mut wal = Wal::open(&config.wal_path, processed_seq)?;

    // Rebuild state from the tail apply-only: handlers must not re-run
    // for history — a dispatch re-fired from a replayed `task.created`
    // would re-execute work that already completed. Whatever handling the
    // crash actually lost is restored by recovery, which works from the
    // rebuilt state, not from the events.
    let mut state = state;
    let mut replayed = 0u64;
    while let Some(record) = wal.next_unprocessed()? {
        state.apply_record(&record);
        wal.mark_processed(record.seq);
        replayed += 1;
    }
    info!(processed_seq, replayed, write_seq = wal.write_seq(), "opened WAL");

    let state = Arc::new(Mutex::new(state));
    let wal = Arc::new(Mutex::new(wal));
    let notify = Arc::new(Notify::new());
    let bus = EventBus::new(Arc::clone(&wal), Arc::clone(&state), notify);

    let (event_tx, event_rx) = mpsc::channel(1024);
    let dispatcher = Dispatcher::new(
        registry,
        Arc::clone(&state),
        event_tx,
        config.engine.clone(),
        SystemClock,
    );
    let engine = Arc::new(Engine::new(
        Arc::clone(&state),
        dispatcher,
        HitlGate::new(load_policy(&config)),
        config.engine.clone(),
        SystemClock,
    ));

    // Built-in definitions, then on-disk ones (which may shadow them)
    for def in sw_workflow::builtin_definitions() {
        engine.register_definition(def);
    }
    match sw_workflow::load_dir(&config.workflows_path) {
        Ok(defs) => {
            for def in defs {
                info!(workflow = %def.name, "registered on-disk workflow definition");
                engine.register_definition(def);
            }
        }
        Err(e) => tracing::warn!(error = %e, "failed to load workflow definitions"),
    }

    let fabric = Arc::new(EventFabric::new(
        Arc::clone(&state),
        config.engine.subscriber_queue,
    ));
    let store = Arc::new(ContextStore::new(
        Arc::clone(&wal),
        Arc::clone(&state),
        SchemaRegistry::default(),
        SystemClock,
    ));

    let listener = TcpListener::bind(config.http_addr)
        .await
        .map_err(|e| LifecycleError::BindFailed(config.http_addr, e))?;
    info!(addr = %config.http_addr, "listening");

    let last_checkpoint_seq = processed_seq;
    Ok(StartupResult {
        daemon: DaemonState {
            config,
            lock_file,
            state,
            engine,
            bus,
            fabric,
            store,
            start_time: Instant::now(),
            last_checkpoint_seq,
        },
        event_rx,
        listener,
    })
}

/// Phase policy from `policy.toml` in the state dir, if present.
fn load_policy(config: &Config) -> PhasePolicy {
    let path = config.state_dir.join("policy.toml");
    match std::fs::read_to_string(&path) {
        Ok(raw) => match toml::from_str(&raw) {
            Ok(policy) => {
                info!(path = %path.display(), "loaded phase policy");
                policy
            }
            Err(e) => {
                tracing::warn!(error = %e, "bad policy.toml, using permissive default");
                PhasePolicy::default()
            }
        },
        Err(_) => PhasePolicy::default(),
    }
}
