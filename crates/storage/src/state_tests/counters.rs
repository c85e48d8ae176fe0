// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sw_core::ProjectId;

#[test]
fn refill_sets_budget_without_toggling() {
    let mut state = MaterializedState::default();
    apply(&mut state, 1, 1_000, project_created_event("prj-a", "App"));
    let project = ProjectId::from_string("prj-a");

    apply(&mut state, 2, 1_001, Event::CounterRefilled { project_id: project, remaining: 5 });
    let counter = state.counter(&project);
    assert_eq!(counter.remaining, 5);
    assert_eq!(counter.initial_value, 5);
    assert!(!counter.enabled, "refill must not flip the toggle");
}

#[test]
fn toggle_is_independent_of_budget() {
    let mut state = MaterializedState::default();
    apply(&mut state, 1, 1_000, project_created_event("prj-a", "App"));
    let project = ProjectId::from_string("prj-a");

    apply(&mut state, 2, 1_001, Event::CounterRefilled { project_id: project, remaining: 3 });
    apply(&mut state, 3, 1_002, Event::CounterToggled { project_id: project, enabled: true });
    assert!(state.counter(&project).enabled);
    assert_eq!(state.counter(&project).remaining, 3);

    // Disabling does not reset remaining
    apply(&mut state, 4, 1_003, Event::CounterToggled { project_id: project, enabled: false });
    assert!(!state.counter(&project).enabled);
    assert_eq!(state.counter(&project).remaining, 3);
}

#[test]
fn decrements_carry_the_result() {
    let mut state = MaterializedState::default();
    apply(&mut state, 1, 1_000, project_created_event("prj-a", "App"));
    let project = ProjectId::from_string("prj-a");

    apply(&mut state, 2, 1_001, Event::CounterRefilled { project_id: project, remaining: 2 });
    apply(&mut state, 3, 1_002, Event::CounterDecremented { project_id: project, remaining: 1 });
    assert_eq!(state.counter(&project).remaining, 1);
    apply(&mut state, 4, 1_003, Event::CounterDecremented { project_id: project, remaining: 0 });
    assert_eq!(state.counter(&project).remaining, 0);
    // initial_value remembers the refill
    assert_eq!(state.counter(&project).initial_value, 2);
}

#[test]
fn counter_for_unknown_project_is_default() {
    let state = MaterializedState::default();
    let counter = state.counter(&ProjectId::from_string("prj-ghost"));
    assert!(!counter.enabled);
    assert_eq!(counter.remaining, 0);
}
