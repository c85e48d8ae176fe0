// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenario specs.

use super::prelude::*;

/// Happy path through the Analyze phase: project → workflow → gate →
/// approve → analyst task → artifact.
#[tokio::test(start_paused = true)]
async fn happy_path_analyze_phase() {
    let mut daemon = TestDaemon::new();
    let project = daemon.create_project("Todo App");
    let run_id = daemon.start_workflow(&project, "greenfield-fullstack");

    let kinds = daemon.audit_kinds(&project.id);
    assert_eq!(
        kinds,
        vec![
            "project.created",
            "workflow.started",
            "workflow.phase_changed",
            "hitl.requested",
            "workflow.paused",
        ]
    );

    let gate = daemon.sole_pending_approval(&project.id);
    assert_eq!(gate.kind, sw_core::ApprovalKind::PhaseGate);
    assert_eq!(gate.request_payload["step_id"], "analyze_plan");

    daemon.respond(&gate, ApprovalAction::Approve);
    daemon.pump().await;

    let kinds = daemon.audit_kinds(&project.id);
    let tail: Vec<&str> = kinds.iter().map(String::as_str).skip(5).collect();
    let expected_order = [
        "hitl.responded",
        "workflow.resumed",
        "task.created",
        "task.started",
        "task.completed",
        "workflow.step_completed",
    ];
    let mut cursor = 0;
    for kind in &tail {
        if cursor < expected_order.len() && *kind == expected_order[cursor] {
            cursor += 1;
        }
    }
    assert_eq!(cursor, expected_order.len(), "missing events in order: {tail:?}");
    assert!(kinds.contains(&"artifact.created".to_string()));

    // The analyst's artifact is typed and committed to the snapshot
    let state = daemon.state.lock();
    let artifact = state
        .latest_artifact(&project.id, "product_requirement")
        .expect("product_requirement artifact");
    assert_eq!(artifact.source_agent, AgentKind::Analyst);
    drop(state);
    assert!(daemon.run(&run_id).context_snapshot.contains_key("product_requirement"));
}

/// Counter-driven auto-approval: two silent approvals, then expiry.
#[tokio::test(start_paused = true)]
async fn counter_auto_approval_then_expiry() {
    let mut daemon = TestDaemon::new();
    let project = daemon.create_project("Todo App");
    daemon.send(Event::CounterRefilled { project_id: project.id, remaining: 2 });
    daemon.send(Event::CounterToggled { project_id: project.id, enabled: true });

    let first = daemon.submit_task(&project, AgentKind::Analyst);
    daemon.pump().await;
    let second = daemon.submit_task(&project, AgentKind::Analyst);
    daemon.pump().await;

    assert_eq!(daemon.task(&first).status, TaskStatus::Completed);
    assert_eq!(daemon.task(&second).status, TaskStatus::Completed);
    let decrements = daemon
        .audit_kinds(&project.id)
        .iter()
        .filter(|k| *k == "counter.decremented")
        .count();
    assert_eq!(decrements, 2);
    assert_eq!(daemon.state.lock().counter(&project.id).remaining, 0);

    // Third identical task parks behind a counter_expiry approval
    let third = daemon.submit_task(&project, AgentKind::Analyst);
    daemon.pump().await;
    assert_eq!(daemon.task(&third).status, TaskStatus::WaitingForHitl);
    let approval = daemon.sole_pending_approval(&project.id);
    assert_eq!(approval.kind, sw_core::ApprovalKind::CounterExpiry);

    daemon.respond(&approval, ApprovalAction::Approve);
    daemon.pump().await;
    assert_eq!(daemon.task(&third).status, TaskStatus::Completed);
    // Counter still exhausted
    assert_eq!(daemon.state.lock().counter(&project.id).remaining, 0);
}

/// Reject cancels the task and pauses the workflow until the user acts.
#[tokio::test(start_paused = true)]
async fn reject_pauses_the_workflow() {
    let mut daemon = TestDaemon::new();
    let project = daemon.create_project("Todo App");
    daemon.send(Event::CounterToggled { project_id: project.id, enabled: true });
    let run_id = daemon.start_workflow(&project, "greenfield-fullstack");

    let gate = daemon.sole_pending_approval(&project.id);
    daemon.respond(&gate, ApprovalAction::Approve);
    daemon.pump().await;

    // The analyst task needs sign-off (counter exhausted from the start)
    let approval = daemon.sole_pending_approval(&project.id);
    let task_id = approval.task_id.expect("task-backed approval");

    daemon.send(Event::HitlResponded {
        id: approval.id,
        project_id: project.id,
        action: ApprovalAction::Reject,
        user_text: Some("wrong scope".to_string()),
    });
    daemon.pump().await;

    let kinds = daemon.audit_kinds(&project.id);
    let responded = kinds.iter().position(|k| k == "hitl.responded").unwrap();
    let cancelled = kinds.iter().rposition(|k| k == "task.cancelled").unwrap();
    let paused = kinds.iter().rposition(|k| k == "workflow.paused").unwrap();
    assert!(responded < cancelled && cancelled < paused);

    assert_eq!(daemon.task(&task_id).status, TaskStatus::Cancelled);
    let run = daemon.run(&run_id);
    assert_eq!(run.status, RunStatus::Paused);
    assert_eq!(run.paused_reason.as_deref(), Some("hitl_rejected"));
    // The recorded response keeps the user's text verbatim
    let record = daemon.state.lock().get_approval(approval.id.as_str()).unwrap().clone();
    assert_eq!(record.user_response.as_deref(), Some("wrong scope"));

    // No further tasks until the user explicitly acts on the run
    let after = &daemon.audit_kinds(&project.id)[cancelled..];
    assert!(!after.contains(&"task.created".to_string()));
}

/// Scheduler retry: two transient failures back off 1 s and 2 s, the
/// third attempt lands.
#[tokio::test(start_paused = true)]
async fn scheduler_retries_with_backoff() {
    let mut daemon = TestDaemon::new();
    daemon.executor.push(ScriptedStep::Transient("timeout".to_string()));
    daemon.executor.push(ScriptedStep::Transient("timeout".to_string()));
    daemon.executor.push(ScriptedStep::Succeed);

    let project = daemon.create_project("Todo App");
    let task_id = daemon.submit_task(&project, AgentKind::Analyst);

    daemon.pump().await;
    daemon.advance_and_fire(Duration::from_secs(1));
    daemon.pump().await;
    daemon.advance_and_fire(Duration::from_secs(2));
    daemon.pump().await;

    let task = daemon.task(&task_id);
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.attempt_count, 3);

    let progress: Vec<(u32, bool)> = daemon
        .state
        .lock()
        .audit
        .iter()
        .filter_map(|r| match &r.event {
            Event::TaskProgress { attempt, error, .. } => Some((*attempt, error.is_some())),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![(1, true), (2, true), (3, false)]);
}

/// Emergency stop: pending work cancels, new submissions are refused
/// until deactivation.
#[tokio::test(start_paused = true)]
async fn emergency_stop_halts_the_project() {
    let mut daemon = TestDaemon::new();
    let project = daemon.create_project("P2");
    daemon.send(Event::CounterToggled { project_id: project.id, enabled: true });

    // Two tasks parked behind approvals (pending work)
    let t1 = daemon.submit_task(&project, AgentKind::Analyst);
    daemon.pump().await;
    let t2 = daemon.submit_task(&project, AgentKind::Coder);
    daemon.pump().await;

    let stop = sw_core::EmergencyStop {
        id: sw_core::StopId::new(),
        scope: sw_core::StopScope::Project(project.id),
        active: true,
        reason: "user_halt".to_string(),
        created_at_ms: daemon.clock.epoch_ms(),
        deactivated_at_ms: None,
    };
    daemon.send(Event::EmergencyStopActivated { stop: stop.clone() });
    daemon.pump().await;

    assert_eq!(daemon.task(&t1).status, TaskStatus::Cancelled);
    assert_eq!(daemon.task(&t2).status, TaskStatus::Cancelled);
    assert!(daemon
        .audit_kinds(&project.id)
        .contains(&"emergency_stop.activated".to_string()));

    // Submissions fail fast while halted
    assert!(daemon.engine.check_admission(&project.id).is_err());

    daemon.send(Event::EmergencyStopDeactivated { id: stop.id });
    assert!(daemon.engine.check_admission(&project.id).is_ok());
    // Cancelled tasks are not resurrected
    assert_eq!(daemon.task(&t1).status, TaskStatus::Cancelled);
}

/// Approving the same approval twice produces exactly one resume.
#[tokio::test(start_paused = true)]
async fn duplicate_responses_do_not_double_drive() {
    let mut daemon = TestDaemon::new();
    let project = daemon.create_project("Todo App");
    daemon.start_workflow(&project, "greenfield-fullstack");

    let gate = daemon.sole_pending_approval(&project.id);
    daemon.respond(&gate, ApprovalAction::Approve);
    daemon.pump().await;
    let created: usize = daemon
        .audit_kinds(&project.id)
        .iter()
        .filter(|k| *k == "task.created")
        .count();

    daemon.respond(&gate, ApprovalAction::Approve);
    daemon.pump().await;
    let after: usize = daemon
        .audit_kinds(&project.id)
        .iter()
        .filter(|k| *k == "task.created")
        .count();
    assert_eq!(created, after);
}
