// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn action_maps_to_resolved_status() {
    assert_eq!(ApprovalAction::Approve.resolved_status(), ApprovalStatus::Approved);
    assert_eq!(ApprovalAction::Reject.resolved_status(), ApprovalStatus::Rejected);
    assert_eq!(ApprovalAction::Modify.resolved_status(), ApprovalStatus::Modified);
}

#[test]
fn approval_expiry_requires_pending_and_deadline() {
    let mut approval = Approval::builder().expires_at_ms(1_000u64).build();
    assert!(!approval.is_expired_at(999));
    assert!(approval.is_expired_at(1_000));

    approval.status = ApprovalStatus::Approved;
    assert!(!approval.is_expired_at(2_000));

    let open_ended = Approval::builder().build();
    assert!(!open_ended.is_expired_at(u64::MAX));
}

#[test]
fn counter_refill_enables_and_sets_budget() {
    let counter = HitlCounter::refilled(5);
    assert!(counter.enabled);
    assert_eq!(counter.remaining, 5);
    assert_eq!(counter.initial_value, 5);

    let fresh = HitlCounter::default();
    assert!(!fresh.enabled);
    assert_eq!(fresh.remaining, 0);
}

#[yare::parameterized(
    global_any   = { StopScope::Global, true },
    same_project = { StopScope::Project(ProjectId::from_string("prj-a")), true },
)]
fn stop_scope_covers(scope_for_a: StopScope, expected: bool) {
    let project = ProjectId::from_string("prj-a");
    assert_eq!(scope_for_a.covers(&project), expected);
}

#[test]
fn stop_scope_other_project_not_covered() {
    let scope = StopScope::Project(ProjectId::from_string("prj-a"));
    assert!(!scope.covers(&ProjectId::from_string("prj-b")));
}

#[test]
fn approval_kind_wire_names() {
    assert_eq!(
        serde_json::to_string(&ApprovalKind::CounterExpiry).unwrap(),
        "\"counter_expiry\""
    );
    assert_eq!(ApprovalKind::PolicyViolation.to_string(), "policy_violation");
}
