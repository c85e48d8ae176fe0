// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event bus: single write path into the WAL.
//!
//! Every event — from HTTP handlers, the dispatcher, timers, or handler
//! effects — goes through [`EventBus::send`]: append, flush, apply to
//! state for immediate visibility, and wake the engine loop. The loop is
//! the only consumer; it reads each record exactly once and runs the
//! handlers, so sending here never double-delivers.

use parking_lot::Mutex;
use std::sync::Arc;
use sw_core::{Clock, Event, EventRecord, SystemClock};
use sw_storage::{MaterializedState, Wal, WalError};
use tokio::sync::Notify;

#[derive(Clone)]
pub struct EventBus {
    pub wal: Arc<Mutex<Wal>>,
    state: Arc<Mutex<MaterializedState>>,
    notify: Arc<Notify>,
    clock: SystemClock,
}

impl EventBus {
    pub fn new(
        wal: Arc<Mutex<Wal>>,
        state: Arc<Mutex<MaterializedState>>,
        notify: Arc<Notify>,
    ) -> Self {
        Self { wal, state, notify, clock: SystemClock }
    }

    /// Persist an event and make it visible.
    ///
    /// Durable (flushed) before return; the returned record carries the
    /// assigned seq. State application here is idempotent with the engine
    /// loop's own application.
    pub fn send(&self, event: Event) -> Result<EventRecord, WalError> {
        let record = {
            let mut wal = self.wal.lock();
            let record = wal.append(self.clock.epoch_ms(), event)?;
            wal.flush()?;
            record
        };
        self.state.lock().apply_record(&record);
        self.notify.notify_one();
        Ok(record)
    }

    /// Append without waking the loop — used from inside the loop itself
    /// while draining, where the next iteration picks it up anyway.
    pub fn append_quiet(&self, event: Event) -> Result<EventRecord, WalError> {
        let record = {
            let mut wal = self.wal.lock();
            let record = wal.append(self.clock.epoch_ms(), event)?;
            if wal.needs_flush() {
                wal.flush()?;
            }
            record
        };
        self.state.lock().apply_record(&record);
        Ok(record)
    }

    pub fn next_unprocessed(&self) -> Result<Option<EventRecord>, WalError> {
        self.wal.lock().next_unprocessed()
    }

    pub fn mark_processed(&self, seq: u64) {
        self.wal.lock().mark_processed(seq);
    }

    pub fn processed_seq(&self) -> u64 {
        self.wal.lock().processed_seq()
    }

    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}
