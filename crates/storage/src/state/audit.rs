// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit trail: the queryable, append-only record of non-control events.

use serde::{Deserialize, Serialize};
use sw_core::{EventRecord, ProjectId, TaskId};

use super::MaterializedState;

/// Append a record to the audit trail.
///
/// Control events (timers, shutdown) are not audited. Replays are
/// detected by seq: the trail is strictly increasing.
pub(crate) fn append(state: &mut MaterializedState, record: &EventRecord) {
    if record.event.is_control() {
        return;
    }
    if state.audit.last().is_some_and(|last| last.seq >= record.seq) {
        return;
    }
    state.audit.push(record.clone());
}

/// Filter for audit-trail queries. All fields are conjunctive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Inclusive lower bound on timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since_ms: Option<u64>,
    /// Exclusive upper bound on timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until_ms: Option<u64>,
    /// Exclusive lower bound on seq (replay cursor)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_seq: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

/// One page of audit results, ascending by seq.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditPage {
    pub events: Vec<EventRecord>,
    /// Whether more results exist past this page
    pub has_more: bool,
}

/// Default page size when the query does not name one.
const DEFAULT_LIMIT: usize = 100;

impl MaterializedState {
    /// Query the audit trail. Results are ascending by seq; `has_more`
    /// signals that another page exists at `offset + limit`.
    pub fn query_audit(&self, query: &AuditQuery) -> AuditPage {
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
        let mut matches = self.audit.iter().filter(|r| {
            query.project_id.is_none_or(|p| r.project_id == Some(p))
                && query.task_id.is_none_or(|t| r.event.task_id() == Some(t))
                && query.kind.as_deref().is_none_or(|k| r.kind() == k)
                && query.since_ms.is_none_or(|s| r.timestamp_ms >= s)
                && query.until_ms.is_none_or(|u| r.timestamp_ms < u)
                && query.after_seq.is_none_or(|s| r.seq > s)
        });

        let events: Vec<EventRecord> =
            matches.by_ref().skip(query.offset).take(limit).cloned().collect();
        let has_more = matches.next().is_some();
        AuditPage { events, has_more }
    }

    /// Replay scoped events after a cursor, for reconnecting subscribers.
    pub fn replay(&self, project_id: Option<ProjectId>, after_seq: u64) -> Vec<EventRecord> {
        self.audit
            .iter()
            .filter(|r| r.seq > after_seq && (project_id.is_none() || r.project_id == project_id))
            .cloned()
            .collect()
    }
}
