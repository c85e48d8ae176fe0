// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon assembly specs: startup, the state-dir lock, the bus write
//! path, and clean shutdown with a final snapshot.

use super::prelude::*;
use std::net::SocketAddr;
use sw_daemon::{startup, Config};
use sw_engine::EngineConfig;

fn config(dir: &std::path::Path) -> Config {
    Config {
        state_dir: dir.to_path_buf(),
        http_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        lock_path: dir.join("daemon.pid"),
        wal_path: dir.join("wal").join("events.wal"),
        snapshot_path: dir.join("snapshot.zst"),
        workflows_path: dir.join("workflows"),
        log_path: dir.join("daemon.log"),
        engine: EngineConfig::default(),
        checkpoint_every: 512,
    }
}

#[tokio::test]
async fn startup_binds_registers_builtins_and_locks() {
    let dir = tempfile::tempdir().unwrap();
    let result = startup(config(dir.path())).await.unwrap();

    assert!(result.daemon.engine.definition("greenfield-fullstack").is_some());
    assert!(dir.path().join("daemon.pid").exists());

    // A second daemon on the same state dir is refused
    let second = startup(config(dir.path())).await;
    assert!(matches!(second, Err(sw_daemon::LifecycleError::LockFailed(_))));
}

#[tokio::test]
async fn bus_sends_are_durable_and_immediately_visible() {
    let dir = tempfile::tempdir().unwrap();
    let result = startup(config(dir.path())).await.unwrap();
    let daemon = result.daemon;

    let project = Project {
        id: ProjectId::new(),
        name: "Todo App".to_string(),
        status: ProjectStatus::Active,
        current_phase: Phase::Intake,
        created_at_ms: 1,
    };
    let record = daemon.bus.send(Event::ProjectCreated { project: project.clone() }).unwrap();
    assert_eq!(record.seq, 1);

    // Read-your-writes through the shared state
    assert!(daemon.state.lock().get_project(project.id.as_str()).is_some());

    // And the wire shape is what clients will see
    let payload = serde_json::to_value(&record.event).unwrap();
    assert_eq!(payload["type"], "project.created");
    assert_eq!(payload["project"]["name"], "Todo App");
}

#[tokio::test]
async fn shutdown_snapshots_so_restart_skips_replay() {
    let dir = tempfile::tempdir().unwrap();
    let result = startup(config(dir.path())).await.unwrap();
    let mut daemon = result.daemon;

    let record = daemon
        .bus
        .send(sw_core::test_support::project_created_event("prj-a", "App"))
        .unwrap();
    daemon.bus.mark_processed(record.seq);
    daemon.shutdown().unwrap();
    assert!(!dir.path().join("daemon.pid").exists());
    drop(daemon);

    let restarted = startup(config(dir.path())).await.unwrap();
    let snapshot = sw_storage::load_snapshot(&dir.path().join("snapshot.zst"))
        .unwrap()
        .expect("final snapshot written");
    assert_eq!(snapshot.seq, 1);
    assert!(restarted.daemon.state.lock().get_project("prj-a").is_some());
}
