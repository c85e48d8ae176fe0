// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for handler tests: a full [`AppState`] over a temp
//! state dir, without the HTTP listener or the engine loop. Handlers
//! validate and emit; the bus applies records immediately, which is all
//! these tests observe.

use crate::event_bus::EventBus;
use crate::http::AppState;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use sw_core::{Event, SystemClock};
use sw_engine::{
    Dispatcher, EchoExecutor, Engine, EngineConfig, EventFabric, ExecutorRegistry, HitlGate,
};
use sw_storage::{ContextStore, MaterializedState, SchemaRegistry, Wal};
use tokio::sync::{mpsc, Notify};

pub(crate) struct Fixture {
    pub app: AppState,
    pub _dir: tempfile::TempDir,
    pub _event_rx: mpsc::Receiver<Event>,
}

pub(crate) fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let wal = Arc::new(Mutex::new(
        Wal::open(&dir.path().join("events.wal"), 0).expect("wal"),
    ));
    let state = Arc::new(Mutex::new(MaterializedState::default()));
    let notify = Arc::new(Notify::new());
    let bus = EventBus::new(Arc::clone(&wal), Arc::clone(&state), notify);

    let (event_tx, event_rx) = mpsc::channel(64);
    let config = EngineConfig::default();
    let dispatcher = Dispatcher::new(
        ExecutorRegistry::uniform(Arc::new(EchoExecutor)),
        Arc::clone(&state),
        event_tx,
        config.clone(),
        SystemClock,
    );
    let engine = Arc::new(Engine::new(
        Arc::clone(&state),
        dispatcher,
        HitlGate::default(),
        config,
        SystemClock,
    ));
    for def in sw_workflow::builtin_definitions() {
        engine.register_definition(def);
    }

    let fabric = Arc::new(EventFabric::new(Arc::clone(&state), 64));
    let store = Arc::new(ContextStore::new(
        Arc::clone(&wal),
        Arc::clone(&state),
        SchemaRegistry::default(),
        SystemClock,
    ));

    Fixture {
        app: AppState { state, engine, bus, fabric, store, start_time: Instant::now() },
        _dir: dir,
        _event_rx: event_rx,
    }
}
