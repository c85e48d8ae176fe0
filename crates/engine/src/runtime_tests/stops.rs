// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Counter, rejection, and emergency-stop behavior.

use super::*;
use sw_core::{ApprovalKind, Clock, EmergencyStop, StopId, StopScope};

#[tokio::test(start_paused = true)]
async fn counter_auto_approves_until_exhausted() {
    let mut h = Harness::new();
    let project = h.create_project("Todo App");
    h.send(Event::CounterRefilled { project_id: project.id, remaining: 2 });
    h.send(Event::CounterToggled { project_id: project.id, enabled: true });

    // First two tasks consume the budget silently
    let t1 = h.submit_task(&project, AgentKind::Analyst);
    h.pump().await;
    let t2 = h.submit_task(&project, AgentKind::Analyst);
    h.pump().await;
    assert_eq!(h.task(&t1).status, TaskStatus::Completed);
    assert_eq!(h.task(&t2).status, TaskStatus::Completed);

    let decrements: Vec<u32> = h
        .log
        .iter()
        .filter_map(|r| match &r.event {
            Event::CounterDecremented { remaining, .. } => Some(*remaining),
            _ => None,
        })
        .collect();
    assert_eq!(decrements, vec![1, 0]);
    assert!(h.kinds().contains(&"counter.exhausted"));
    assert_eq!(h.engine.state().lock().counter(&project.id).remaining, 0);

    // Third task hits counter expiry and waits
    let t3 = h.submit_task(&project, AgentKind::Analyst);
    h.pump().await;
    assert_eq!(h.task(&t3).status, TaskStatus::WaitingForHitl);
    let approval = h.sole_pending_approval(&project.id);
    assert_eq!(approval.kind, ApprovalKind::CounterExpiry);

    // Approval releases it; the counter stays at zero
    h.respond(approval.id, ApprovalAction::Approve);
    h.pump().await;
    assert_eq!(h.task(&t3).status, TaskStatus::Completed);
    assert_eq!(h.engine.state().lock().counter(&project.id).remaining, 0);
}

#[tokio::test(start_paused = true)]
async fn counter_invariant_refill_minus_k_approvals() {
    let mut h = Harness::new();
    let project = h.create_project("Todo App");
    h.send(Event::CounterRefilled { project_id: project.id, remaining: 5 });
    h.send(Event::CounterToggled { project_id: project.id, enabled: true });

    for _ in 0..3 {
        h.submit_task(&project, AgentKind::Tester);
        h.pump().await;
    }

    let decrements = h.kinds().iter().filter(|k| **k == "counter.decremented").count();
    assert_eq!(decrements, 3);
    assert_eq!(h.engine.state().lock().counter(&project.id).remaining, 2);
}

#[tokio::test(start_paused = true)]
async fn rejecting_a_task_approval_pauses_the_workflow() {
    let mut h = Harness::new();
    let project = h.create_project("Todo App");
    h.send(Event::CounterToggled { project_id: project.id, enabled: true });
    // remaining stays 0: every task needs sign-off
    let run_id = h.start_workflow(&project, "greenfield-fullstack");

    // Pass the analyze gate; the analyst task then waits on counter expiry
    let gate = h.sole_pending_approval(&project.id);
    h.respond(gate.id, ApprovalAction::Approve);
    h.pump().await;

    let approval = h.sole_pending_approval(&project.id);
    assert_eq!(approval.kind, ApprovalKind::CounterExpiry);
    let task_id = approval.task_id.unwrap();

    h.respond_with(approval.id, ApprovalAction::Reject, Some("wrong scope"));
    h.pump().await;

    let task = h.task(&task_id);
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert!(task.error.as_deref().unwrap().contains("hitl_rejected"));
    assert!(task.error.as_deref().unwrap().contains("user"));

    let run = h.run(&run_id);
    assert_eq!(run.status, RunStatus::Paused);
    assert_eq!(run.paused_reason.as_deref(), Some("hitl_rejected"));

    // Nothing new was created after the rejection
    let position = h.kinds().iter().rposition(|k| *k == "task.cancelled").unwrap();
    assert!(!h.kinds()[position..].contains(&"task.created"));
}

#[tokio::test(start_paused = true)]
async fn repeated_responses_are_idempotent() {
    let mut h = Harness::new();
    let project = h.create_project("Todo App");
    h.start_workflow(&project, "greenfield-fullstack");

    let approval = h.sole_pending_approval(&project.id);
    h.respond(approval.id, ApprovalAction::Approve);
    h.pump().await;
    let tasks_after_first = h.engine.state().lock().tasks.len();

    // A stale duplicate response must not re-drive the workflow
    h.respond(approval.id, ApprovalAction::Approve);
    h.pump().await;
    assert_eq!(h.engine.state().lock().tasks.len(), tasks_after_first);

    // A conflicting late response is ignored outright
    h.respond(approval.id, ApprovalAction::Reject);
    h.pump().await;
    let record = h.engine.state().lock().get_approval(approval.id.as_str()).unwrap().clone();
    assert_eq!(record.status, sw_core::ApprovalStatus::Approved);
}

#[tokio::test(start_paused = true)]
async fn modify_attaches_guidance_before_resume() {
    let mut h = Harness::new();
    let project = h.create_project("Todo App");
    h.send(Event::CounterToggled { project_id: project.id, enabled: true });

    let task_id = h.submit_task(&project, AgentKind::Coder);
    h.pump().await;
    let approval = h.sole_pending_approval(&project.id);
    assert_eq!(approval.kind, ApprovalKind::CounterExpiry);

    h.respond_with(approval.id, ApprovalAction::Modify, Some("focus on the API first"));
    h.pump().await;

    let task = h.task(&task_id);
    assert_eq!(task.status, TaskStatus::Completed);

    let state = h.engine.state();
    let state = state.lock();
    let guidance = state.latest_artifact(&project.id, "user_guidance").unwrap();
    assert_eq!(guidance.content["text"], "focus on the API first");
    assert!(task.context_ids.contains(&guidance.id));
}

#[tokio::test(start_paused = true)]
async fn emergency_stop_cancels_in_scope_work() {
    let mut h = Harness::new();
    let p_stopped = h.create_project("Halted");
    let p_other = h.create_project("Unaffected");

    // Park two pending tasks behind approvals so they stay non-terminal
    h.send(Event::CounterToggled { project_id: p_stopped.id, enabled: true });
    let t1 = h.submit_task(&p_stopped, AgentKind::Analyst);
    h.pump().await;
    let t2 = h.submit_task(&p_stopped, AgentKind::Coder);
    h.pump().await;
    let t_other = h.submit_task(&p_other, AgentKind::Analyst);
    h.pump().await;

    assert_eq!(h.task(&t1).status, TaskStatus::WaitingForHitl);
    assert_eq!(h.task(&t2).status, TaskStatus::WaitingForHitl);

    let stop = EmergencyStop {
        id: StopId::new(),
        scope: StopScope::Project(p_stopped.id),
        active: true,
        reason: "user_halt".to_string(),
        created_at_ms: h.clock.epoch_ms(),
        deactivated_at_ms: None,
    };
    h.send(Event::EmergencyStopActivated { stop: stop.clone() });
    h.pump().await;

    assert_eq!(h.task(&t1).status, TaskStatus::Cancelled);
    assert_eq!(h.task(&t2).status, TaskStatus::Cancelled);
    // Other project untouched
    assert_eq!(h.task(&t_other).status, TaskStatus::Completed);

    // Admission refuses while the stop is active
    assert!(matches!(
        h.engine.check_admission(&p_stopped.id),
        Err(crate::error::RuntimeError::Halted(_))
    ));
    assert!(h.engine.check_admission(&p_other.id).is_ok());

    // Deactivation reopens admission but resumes nothing
    h.send(Event::EmergencyStopDeactivated { id: stop.id });
    assert!(h.engine.check_admission(&p_stopped.id).is_ok());
    assert_eq!(h.task(&t1).status, TaskStatus::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn cancel_request_routing() {
    let mut h = Harness::new();
    let project = h.create_project("Todo App");
    h.send(Event::CounterToggled { project_id: project.id, enabled: true });

    // Pending-behind-approval task cancels immediately
    let waiting = h.submit_task(&project, AgentKind::Analyst);
    h.pump().await;
    h.send(Event::TaskCancelRequested {
        id: waiting,
        project_id: project.id,
        reason: "changed my mind".to_string(),
        by: sw_core::CancelledBy::User,
    });
    let task = h.task(&waiting);
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert_eq!(task.error.as_deref(), Some("cancelled by user: changed my mind"));

    // Terminal tasks refuse another cancel
    assert!(matches!(
        h.engine.check_cancel(waiting.as_str()),
        Err(crate::error::RuntimeError::AlreadyTerminal(_))
    ));
}
