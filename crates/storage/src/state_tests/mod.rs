// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reducer tests: every handler must be idempotent and every task
//! transition must respect the state machine.

use super::MaterializedState;
use sw_core::test_support::*;
use sw_core::{Event, EventRecord};

mod approvals;
mod audit;
mod counters;
mod runs;
mod tasks;

/// Apply an event at the next seq, twice, asserting idempotency.
pub(crate) fn apply(state: &mut MaterializedState, seq: u64, ts: u64, event: Event) {
    let record = EventRecord::new(seq, ts, event);
    state.apply_record(&record);
    let snapshot = format!("{state:?}");
    state.apply_record(&record);
    assert_eq!(snapshot, format!("{state:?}"), "apply_record must be idempotent");
}

#[test]
fn project_created_inserts_project_and_counter() {
    let mut state = MaterializedState::default();
    apply(&mut state, 1, 1_000, project_created_event("prj-a", "Todo App"));

    let project = state.get_project("prj-a").unwrap();
    assert_eq!(project.name, "Todo App");
    assert_eq!(project.status, sw_core::ProjectStatus::Active);

    let counter = state.counter(&sw_core::ProjectId::from_string("prj-a"));
    assert!(!counter.enabled);
    assert_eq!(counter.remaining, 0);
}

#[test]
fn prefix_lookup_resolves_unique_prefixes() {
    let mut state = MaterializedState::default();
    apply(&mut state, 1, 1_000, project_created_event("prj-abc123", "One"));

    assert!(state.get_project("prj-abc").is_some());
    assert!(state.get_project("prj-zzz").is_none());
}
