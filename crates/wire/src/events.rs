// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket wire frames.

use serde::{Deserialize, Serialize};
use sw_core::EventRecord;

/// One event as pushed to clients and returned by the audit API.
///
/// `event_id` is the monotone sequence number — it is the replay cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    pub event_id: u64,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub timestamp: u64,
    pub payload: serde_json::Value,
}

impl From<&EventRecord> for EventFrame {
    fn from(record: &EventRecord) -> Self {
        Self {
            event_id: record.seq,
            kind: record.kind().to_string(),
            project_id: record.project_id.map(|p| p.to_string()),
            timestamp: record.timestamp_ms,
            payload: serde_json::to_value(&record.event).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Messages a client may send on the events socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Narrow (or widen) the subscription to one project
    Subscribe {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project_id: Option<String>,
    },
    /// Catch up on events after a cursor
    Replay { since: u64 },
    Ping,
}

/// Messages the server pushes on the events socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Event(EventFrame),
    /// Replayed batch, ascending by event id
    Replay { events: Vec<EventFrame> },
    Pong,
    /// The subscriber queue overflowed; replay from the last seen
    /// event id to recover
    ResyncRequired,
}
