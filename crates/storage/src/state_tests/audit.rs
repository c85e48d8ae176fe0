// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::state::AuditQuery;
use sw_core::{AgentKind, ProjectId, TimerId};

fn populated_state() -> (MaterializedState, sw_core::TaskId) {
    let mut state = MaterializedState::default();
    apply(&mut state, 1, 1_000, project_created_event("prj-a", "App"));
    apply(&mut state, 2, 1_010, project_created_event("prj-b", "Other"));
    let (task_id, event) = task_created_event("prj-a", AgentKind::Analyst);
    apply(&mut state, 3, 1_020, event);
    apply(
        &mut state,
        4,
        1_030,
        Event::TaskStarted { id: task_id, project_id: ProjectId::from_string("prj-a"), attempt: 1 },
    );
    // Control events never reach the audit trail
    apply(&mut state, 5, 1_040, Event::TimerFired { id: TimerId::hitl_sweep() });
    (state, task_id)
}

#[test]
fn control_events_are_not_audited() {
    let (state, _) = populated_state();
    assert_eq!(state.audit.len(), 4);
    assert!(state.audit.iter().all(|r| !r.event.is_control()));
}

#[test]
fn audit_is_ordered_by_seq() {
    let (state, _) = populated_state();
    let seqs: Vec<u64> = state.audit.iter().map(|r| r.seq).collect();
    let mut sorted = seqs.clone();
    sorted.sort_unstable();
    assert_eq!(seqs, sorted);
}

#[test]
fn query_filters_by_project_and_kind() {
    let (state, _) = populated_state();
    let page = state.query_audit(&AuditQuery {
        project_id: Some(ProjectId::from_string("prj-a")),
        kind: Some("task.started".to_string()),
        ..Default::default()
    });
    assert_eq!(page.events.len(), 1);
    assert_eq!(page.events[0].seq, 4);
    assert!(!page.has_more);
}

#[test]
fn query_filters_by_task() {
    let (state, task_id) = populated_state();
    let page = state.query_audit(&AuditQuery { task_id: Some(task_id), ..Default::default() });
    assert_eq!(page.events.len(), 2);
    assert_eq!(page.events[0].kind(), "task.created");
    assert_eq!(page.events[1].kind(), "task.started");
}

#[test]
fn query_respects_time_bounds() {
    let (state, _) = populated_state();
    let page = state.query_audit(&AuditQuery {
        since_ms: Some(1_010),
        until_ms: Some(1_030),
        ..Default::default()
    });
    assert_eq!(page.events.len(), 2);
    assert_eq!(page.events[0].seq, 2);
    assert_eq!(page.events[1].seq, 3);
}

#[test]
fn query_paginates_with_has_more() {
    let (state, _) = populated_state();
    let first = state.query_audit(&AuditQuery { limit: Some(2), ..Default::default() });
    assert_eq!(first.events.len(), 2);
    assert!(first.has_more);

    let second =
        state.query_audit(&AuditQuery { limit: Some(2), offset: 2, ..Default::default() });
    assert_eq!(second.events.len(), 2);
    assert!(!second.has_more);
    assert!(first.events[1].seq < second.events[0].seq);
}

#[test]
fn replay_yields_a_suffix_per_project() {
    let (state, _) = populated_state();
    let project = ProjectId::from_string("prj-a");

    let all = state.replay(Some(project), 0);
    let seqs: Vec<u64> = all.iter().map(|r| r.seq).collect();
    assert_eq!(seqs, vec![1, 3, 4]);

    let suffix = state.replay(Some(project), 3);
    assert_eq!(suffix.len(), 1);
    assert_eq!(suffix[0].seq, 4);

    // Global replay sees both projects
    assert_eq!(state.replay(None, 0).len(), 4);
}
