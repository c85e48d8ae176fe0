// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit trail queries.

use super::{ApiError, AppState};
use axum::extract::{Query, State};
use axum::Json;
use sw_core::{ProjectId, TaskId};
use sw_storage::AuditQuery;
use sw_wire as wire;

pub async fn events(
    State(app): State<AppState>,
    Query(params): Query<wire::AuditQueryParams>,
) -> Result<Json<wire::AuditEventsResponse>, ApiError> {
    let query = AuditQuery {
        project_id: params.project_id.as_deref().map(ProjectId::from_string),
        task_id: params.task_id.as_deref().map(TaskId::from_string),
        kind: params.kind,
        since_ms: params.since.as_deref().map(parse_time).transpose()?,
        until_ms: params.until.as_deref().map(parse_time).transpose()?,
        after_seq: None,
        limit: params.limit,
        offset: params.offset,
    };

    let page = app.state.lock().query_audit(&query);
    Ok(Json(wire::AuditEventsResponse {
        events: page.events.iter().map(wire::EventFrame::from).collect(),
        has_more: page.has_more,
    }))
}

/// Accepts epoch milliseconds or an RFC 3339 timestamp.
fn parse_time(raw: &str) -> Result<u64, ApiError> {
    if let Ok(ms) = raw.parse::<u64>() {
        return Ok(ms);
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp_millis().max(0) as u64)
        .map_err(|_| ApiError::validation(format!("bad timestamp: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_time_accepts_both_forms() {
        assert_eq!(parse_time("1700000000000").unwrap(), 1_700_000_000_000);
        let rfc = parse_time("2023-11-14T22:13:20Z").unwrap();
        assert_eq!(rfc, 1_700_000_000_000);
        assert!(parse_time("yesterday").is_err());
    }
}
