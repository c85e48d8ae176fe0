// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event fabric: fan-out of persisted events to live subscribers.
//!
//! Publication never blocks on a subscriber. Each subscriber owns a
//! bounded queue; overflowing it drops the subscriber, who receives a
//! `ResyncRequired` signal and recovers through [`EventFabric::replay`].

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use sw_core::{EventRecord, ProjectId};
use sw_storage::MaterializedState;
use tokio::sync::mpsc;

/// What a subscriber wants to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeScope {
    Global,
    Project(ProjectId),
}

impl SubscribeScope {
    fn matches(&self, record: &EventRecord) -> bool {
        match self {
            SubscribeScope::Global => true,
            SubscribeScope::Project(id) => record.project_id == Some(*id),
        }
    }
}

/// Message delivered to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum FabricMessage {
    Event(EventRecord),
    /// The subscriber fell too far behind and was dropped; it must
    /// replay from its last seen seq to recover.
    ResyncRequired,
}

struct Subscriber {
    scope: SubscribeScope,
    tx: mpsc::Sender<FabricMessage>,
}

/// A cancellable subscription handle.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<FabricMessage>,
    fabric: Arc<FabricInner>,
    resync_signalled: bool,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next message. A closed queue (dropped for backpressure) surfaces
    /// one final `ResyncRequired`, then `None`.
    pub async fn recv(&mut self) -> Option<FabricMessage> {
        match self.rx.recv().await {
            Some(message) => {
                if message == FabricMessage::ResyncRequired {
                    self.resync_signalled = true;
                }
                Some(message)
            }
            None if !self.resync_signalled => {
                self.resync_signalled = true;
                Some(FabricMessage::ResyncRequired)
            }
            None => None,
        }
    }

    /// Stop receiving. Idempotent; dropping the handle does the same.
    pub fn cancel(&self) {
        self.fabric.remove(self.id);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.fabric.remove(self.id);
    }
}

struct FabricInner {
    subscribers: Mutex<HashMap<u64, Subscriber>>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl FabricInner {
    fn remove(&self, id: u64) {
        self.subscribers.lock().remove(&id);
    }
}

/// Project-scoped event fan-out over the audit trail.
pub struct EventFabric {
    inner: Arc<FabricInner>,
    state: Arc<Mutex<MaterializedState>>,
}

impl EventFabric {
    pub fn new(state: Arc<Mutex<MaterializedState>>, queue_capacity: usize) -> Self {
        Self {
            inner: Arc::new(FabricInner {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                queue_capacity,
            }),
            state,
        }
    }

    /// Register a subscriber. Events published after this call that match
    /// the scope will be delivered, in publication order.
    pub fn subscribe(&self, scope: SubscribeScope) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.queue_capacity);
        self.inner.subscribers.lock().insert(id, Subscriber { scope, tx });
        Subscription { id, rx, fabric: Arc::clone(&self.inner), resync_signalled: false }
    }

    /// Fan a persisted record out to matching subscribers.
    ///
    /// Non-blocking: a subscriber whose queue is full is dropped on the
    /// spot. The record must already be durable — the audit trail, not
    /// this call, is the source of truth.
    pub fn publish(&self, record: &EventRecord) {
        if record.event.is_control() {
            return;
        }
        let mut dropped = Vec::new();
        {
            let subscribers = self.inner.subscribers.lock();
            for (id, subscriber) in subscribers.iter() {
                if !subscriber.scope.matches(record) {
                    continue;
                }
                match subscriber.tx.try_send(FabricMessage::Event(record.clone())) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(
                            subscriber = id,
                            seq = record.seq,
                            "subscriber overflowed, dropping with resync signal"
                        );
                        dropped.push(*id);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => dropped.push(*id),
                }
            }
        }
        if !dropped.is_empty() {
            let mut subscribers = self.inner.subscribers.lock();
            for id in dropped {
                // Closing the channel surfaces ResyncRequired on the
                // subscriber side once it drains its queue
                subscribers.remove(&id);
            }
        }
    }

    /// Events after a cursor for a reconnecting client, in seq order.
    pub fn replay(&self, project_id: Option<ProjectId>, after_seq: u64) -> Vec<EventRecord> {
        self.state.lock().replay(project_id, after_seq)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }
}

#[cfg(test)]
#[path = "fabric_tests.rs"]
mod tests;
