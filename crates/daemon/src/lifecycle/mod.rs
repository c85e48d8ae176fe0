// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

mod startup;
pub use startup::{startup, startup_with_registry, StartupResult};

use std::fs::File;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use sw_core::SystemClock;
use sw_engine::{Engine, EngineConfig, EventFabric};
use sw_storage::{Checkpointer, ContextStore, MaterializedState};
use thiserror::Error;
use tracing::{info, warn};

use crate::event_bus::EventBus;

/// Engine with the daemon's concrete clock.
pub type DaemonEngine = Engine<SystemClock>;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/shipwright)
    pub state_dir: PathBuf,
    /// HTTP listen address
    pub http_addr: SocketAddr,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to WAL file
    pub wal_path: PathBuf,
    /// Path to snapshot file
    pub snapshot_path: PathBuf,
    /// Directory of on-disk workflow definitions
    pub workflows_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Engine tuning
    pub engine: EngineConfig,
    /// Checkpoint after this many processed events
    pub checkpoint_every: u64,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Uses fixed paths under the state dir; one daemon serves all
    /// projects for a user.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = crate::env::state_dir()?;
        let mut engine = EngineConfig::default();
        if let Some(pool) = crate::env::worker_pool() {
            engine.worker_pool_size = pool;
        }
        if let Some(timeout) = crate::env::attempt_timeout() {
            engine.attempt_timeout = timeout;
        }
        if let Some(interval) = crate::env::sweep_interval() {
            engine.sweep_interval = interval;
        }
        engine.approval_ttl = crate::env::approval_ttl();

        Ok(Self {
            http_addr: SocketAddr::from(([127, 0, 0, 1], crate::env::http_port())),
            lock_path: state_dir.join("daemon.pid"),
            wal_path: state_dir.join("wal").join("events.wal"),
            snapshot_path: state_dir.join("snapshot.zst"),
            workflows_path: state_dir.join("workflows"),
            log_path: state_dir.join("daemon.log"),
            engine,
            checkpoint_every: crate::env::checkpoint_every(),
            state_dir,
        })
    }
}

/// Daemon state during operation.
pub struct DaemonState {
    /// Configuration
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Materialized state (shared with engine, bus, and HTTP handlers)
    pub state: Arc<Mutex<MaterializedState>>,
    /// The engine (shared with HTTP handlers for admission checks)
    pub engine: Arc<DaemonEngine>,
    /// WAL-backed event bus
    pub bus: EventBus,
    /// Subscriber fan-out
    pub fabric: Arc<EventFabric>,
    /// Typed artifact repository over the same WAL
    pub store: Arc<ContextStore<SystemClock>>,
    /// When the daemon started
    pub start_time: Instant,
    /// Seq of the last checkpoint taken
    pub last_checkpoint_seq: u64,
}

impl DaemonState {
    /// Shared context for the HTTP layer.
    pub fn app_state(&self) -> crate::http::AppState {
        crate::http::AppState {
            state: Arc::clone(&self.state),
            engine: Arc::clone(&self.engine),
            bus: self.bus.clone(),
            fabric: Arc::clone(&self.fabric),
            store: Arc::clone(&self.store),
            start_time: self.start_time,
        }
    }

    /// Take a snapshot if enough events have been processed since the
    /// last one, then compact the WAL behind it.
    pub fn maybe_checkpoint(&mut self) {
        let processed = self.bus.processed_seq();
        if processed.saturating_sub(self.last_checkpoint_seq) < self.config.checkpoint_every {
            return;
        }
        self.checkpoint(processed);
    }

    fn checkpoint(&mut self, seq: u64) {
        let snapshot_state = self.state.lock().clone();
        let checkpointer = Checkpointer::new(self.config.snapshot_path.clone());
        match checkpointer.checkpoint_sync(seq, &snapshot_state) {
            Ok(result) => {
                info!(seq = result.seq, size_bytes = result.size_bytes, "checkpoint saved");
                self.last_checkpoint_seq = seq;
                if let Err(e) = self.bus.wal.lock().truncate_before(seq) {
                    warn!(error = %e, "failed to compact WAL after checkpoint");
                }
            }
            Err(e) => warn!(error = %e, "checkpoint failed"),
        }
    }

    /// Shutdown the daemon gracefully.
    ///
    /// Flushes buffered WAL events and saves a final snapshot so the next
    /// startup replays as little as possible.
    pub fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("shutting down daemon");

        if let Err(e) = self.bus.wal.lock().flush() {
            warn!(error = %e, "failed to flush WAL on shutdown");
        }

        let processed = self.bus.processed_seq();
        if processed > 0 {
            self.checkpoint(processed);
        }

        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!(error = %e, "failed to remove PID file");
            }
        }

        info!("daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory")]
    NoStateDir,

    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to bind {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    #[error("WAL error: {0}")]
    Wal(#[from] sw_storage::WalError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] sw_storage::SnapshotError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl LifecycleError {
    /// Process exit code for this failure class: 1 config, 2 storage,
    /// 3 unrecoverable runtime.
    pub fn exit_code(&self) -> i32 {
        match self {
            LifecycleError::NoStateDir => 1,
            LifecycleError::LockFailed(_)
            | LifecycleError::BindFailed(..)
            | LifecycleError::Wal(_)
            | LifecycleError::Snapshot(_)
            | LifecycleError::Io(_) => 2,
            LifecycleError::Runtime(_) => 3,
        }
    }
}
