// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sw_core::{
    AgentKind, Approval, ApprovalAction, ApprovalStatus, ProjectId, StopId, StopScope, TaskStatus,
};

fn state_with_waiting_task() -> (MaterializedState, sw_core::TaskId, Approval) {
    let mut state = MaterializedState::default();
    apply(&mut state, 1, 1_000, project_created_event("prj-a", "App"));
    let (task_id, event) = task_created_event("prj-a", AgentKind::Coder);
    apply(&mut state, 2, 1_001, event);

    let approval = Approval::builder()
        .project_id(ProjectId::from_string("prj-a"))
        .task_id(task_id)
        .created_at_ms(1_002u64)
        .build();
    apply(&mut state, 3, 1_002, Event::HitlRequested { approval: approval.clone() });
    (state, task_id, approval)
}

#[test]
fn request_parks_the_task() {
    let (state, task_id, approval) = state_with_waiting_task();
    assert_eq!(state.get_task(task_id.as_str()).unwrap().status, TaskStatus::WaitingForHitl);
    assert!(state.get_approval(approval.id.as_str()).unwrap().is_pending());
    assert_eq!(state.pending_approval_for_task(task_id.as_str()).unwrap().id, approval.id);
}

#[test]
fn second_pending_request_for_same_task_is_dropped() {
    let (mut state, task_id, _) = state_with_waiting_task();

    let duplicate = Approval::builder()
        .project_id(ProjectId::from_string("prj-a"))
        .task_id(task_id)
        .created_at_ms(1_003u64)
        .build();
    apply(&mut state, 4, 1_003, Event::HitlRequested { approval: duplicate.clone() });

    assert!(state.get_approval(duplicate.id.as_str()).is_none());
    let pending: Vec<_> =
        state.approvals.values().filter(|a| a.task_id == Some(task_id) && a.is_pending()).collect();
    assert_eq!(pending.len(), 1);
}

#[test]
fn first_response_wins_and_repeats_are_noops() {
    let (mut state, _, approval) = state_with_waiting_task();
    let project = ProjectId::from_string("prj-a");

    apply(
        &mut state,
        4,
        2_000,
        Event::HitlResponded {
            id: approval.id,
            project_id: project,
            action: ApprovalAction::Approve,
            user_text: None,
        },
    );
    let resolved = state.get_approval(approval.id.as_str()).unwrap();
    assert_eq!(resolved.status, ApprovalStatus::Approved);
    assert_eq!(resolved.responded_at_ms, Some(2_000));

    // A later, conflicting response cannot rewrite the outcome
    apply(
        &mut state,
        5,
        3_000,
        Event::HitlResponded {
            id: approval.id,
            project_id: project,
            action: ApprovalAction::Reject,
            user_text: Some("too late".to_string()),
        },
    );
    let resolved = state.get_approval(approval.id.as_str()).unwrap();
    assert_eq!(resolved.status, ApprovalStatus::Approved);
    assert_eq!(resolved.responded_at_ms, Some(2_000));
    assert!(resolved.user_response.is_none());
}

#[test]
fn expiry_only_touches_pending_approvals() {
    let (mut state, _, approval) = state_with_waiting_task();
    let project = ProjectId::from_string("prj-a");

    apply(&mut state, 4, 2_000, Event::HitlExpired { id: approval.id, project_id: project });
    assert_eq!(
        state.get_approval(approval.id.as_str()).unwrap().status,
        ApprovalStatus::Expired
    );

    // Expiring an already-resolved approval does nothing
    let (mut state, _, approval) = state_with_waiting_task();
    apply(
        &mut state,
        4,
        2_000,
        Event::HitlResponded {
            id: approval.id,
            project_id: project,
            action: ApprovalAction::Approve,
            user_text: None,
        },
    );
    apply(&mut state, 5, 3_000, Event::HitlExpired { id: approval.id, project_id: project });
    assert_eq!(
        state.get_approval(approval.id.as_str()).unwrap().status,
        ApprovalStatus::Approved
    );
}

#[test]
fn stop_activation_and_deactivation() {
    let mut state = MaterializedState::default();
    apply(&mut state, 1, 1_000, project_created_event("prj-a", "App"));
    let project = ProjectId::from_string("prj-a");

    let stop = sw_core::EmergencyStop {
        id: StopId::new(),
        scope: StopScope::Project(project),
        active: true,
        reason: "user_halt".to_string(),
        created_at_ms: 1_001,
        deactivated_at_ms: None,
    };
    apply(&mut state, 2, 1_001, Event::EmergencyStopActivated { stop: stop.clone() });
    assert!(state.active_stop_for(&project).is_some());
    assert!(state.active_stop_for(&ProjectId::from_string("prj-b")).is_none());

    apply(&mut state, 3, 1_002, Event::EmergencyStopDeactivated { id: stop.id });
    assert!(state.active_stop_for(&project).is_none());
    // Record kept for audit
    let kept = &state.stops[stop.id.as_str()];
    assert!(!kept.active);
    assert_eq!(kept.deactivated_at_ms, Some(1_002));
}

#[test]
fn global_stop_covers_every_project() {
    let mut state = MaterializedState::default();
    apply(&mut state, 1, 1_000, project_created_event("prj-a", "App"));

    let stop = sw_core::EmergencyStop {
        id: StopId::new(),
        scope: StopScope::Global,
        active: true,
        reason: "maintenance".to_string(),
        created_at_ms: 1_001,
        deactivated_at_ms: None,
    };
    apply(&mut state, 2, 1_001, Event::EmergencyStopActivated { stop });
    assert!(state.active_stop_for(&ProjectId::from_string("prj-a")).is_some());
    assert!(state.active_stop_for(&ProjectId::from_string("prj-anything")).is_some());
}
