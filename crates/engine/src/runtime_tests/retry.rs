// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry, timeout, stall, expiry, and recovery behavior.

use super::*;
use crate::executor::ScriptedStep;
use sw_core::{Clock, TimerId};

#[tokio::test(start_paused = true)]
async fn transient_failures_back_off_then_succeed() {
    let mut h = Harness::with_script(vec![
        ScriptedStep::Transient("timeout".to_string()),
        ScriptedStep::Transient("timeout".to_string()),
        ScriptedStep::Succeed,
    ]);
    let project = h.create_project("Todo App");
    let task_id = h.submit_task(&project, AgentKind::Analyst);

    // Attempt 1 fails; a 1 s backoff timer is armed
    h.pump().await;
    assert_eq!(h.task(&task_id).status, TaskStatus::Working);
    h.advance_and_fire(Duration::from_secs(1));

    // Attempt 2 fails; 2 s backoff
    h.pump().await;
    h.advance_and_fire(Duration::from_secs(2));

    // Attempt 3 succeeds
    h.pump().await;
    let task = h.task(&task_id);
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.attempt_count, 3);

    let progress: Vec<(u32, Option<String>)> = h
        .log
        .iter()
        .filter_map(|r| match &r.event {
            Event::TaskProgress { attempt, error, .. } => Some((*attempt, error.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(
        progress,
        vec![
            (1, Some("transient: timeout".to_string())),
            (2, Some("transient: timeout".to_string())),
            (3, None),
        ]
    );
    // Exactly one task.started, at attempt 1
    let starts = h.kinds().iter().filter(|k| **k == "task.started").count();
    assert_eq!(starts, 1);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_exhaust_the_attempt_ceiling() {
    let mut h = Harness::with_script(vec![
        ScriptedStep::Transient("rate limited".to_string()),
        ScriptedStep::Transient("rate limited".to_string()),
        ScriptedStep::Transient("rate limited".to_string()),
    ]);
    let project = h.create_project("Todo App");
    let task_id = h.submit_task(&project, AgentKind::Analyst);

    h.pump().await;
    h.advance_and_fire(Duration::from_secs(1));
    h.pump().await;
    h.advance_and_fire(Duration::from_secs(2));
    h.pump().await;

    let task = h.task(&task_id);
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.attempt_count, 3);
    assert!(task.error.as_deref().unwrap().contains("rate limited"));
}

#[tokio::test(start_paused = true)]
async fn attempt_timeout_is_a_transient_failure() {
    let mut config = EngineConfig::default();
    config.attempt_timeout = Duration::from_secs(5);
    let mut h = Harness::with_config(
        vec![ScriptedStep::Hang(Duration::from_secs(3600)), ScriptedStep::Succeed],
        config,
    );
    let project = h.create_project("Todo App");
    let task_id = h.submit_task(&project, AgentKind::Analyst);

    // Paused tokio time fast-forwards through the hang to the timeout
    tokio::time::sleep(Duration::from_secs(6)).await;
    h.pump().await;
    let progress_errors: Vec<String> = h
        .log
        .iter()
        .filter_map(|r| match &r.event {
            Event::TaskProgress { error: Some(e), .. } => Some(e.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(progress_errors, vec!["transient: attempt timeout".to_string()]);

    h.advance_and_fire(Duration::from_secs(1));
    h.pump().await;
    assert_eq!(h.task(&task_id).status, TaskStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn workflow_retries_a_failed_step_then_escalates() {
    let mut h = Harness::with_script(vec![
        ScriptedStep::Reject("bad output".to_string()),
        ScriptedStep::Reject("bad output again".to_string()),
    ]);
    let project = h.create_project("Todo App");
    let run_id = h.start_workflow(&project, "greenfield-fullstack");

    let gate = h.sole_pending_approval(&project.id);
    h.respond(gate.id, ApprovalAction::Approve);
    h.pump().await;

    // First failure consumed the workflow-level retry, second escalated
    assert!(h.kinds().contains(&"workflow.step_retried"));
    let run = h.run(&run_id);
    assert_eq!(run.status, RunStatus::Paused);
    assert!(run.paused_reason.as_deref().unwrap().starts_with("step_failure"));

    let escalation = h.sole_pending_approval(&project.id);
    assert_eq!(escalation.request_payload["escalation"], "step_failure");

    // Approving retries the step; the scripted executor now succeeds
    h.respond(escalation.id, ApprovalAction::Approve);
    h.pump().await;
    let run = h.run(&run_id);
    assert_eq!(run.status, RunStatus::Paused);
    assert_eq!(
        h.sole_pending_approval(&project.id).request_payload["step_id"],
        "design_plan"
    );
}

#[tokio::test(start_paused = true)]
async fn cancellation_grace_is_enforced() {
    let mut h = Harness::with_script(vec![ScriptedStep::Hang(Duration::from_secs(3600))]);
    let project = h.create_project("Todo App");
    let task_id = h.submit_task(&project, AgentKind::Coder);

    // Let the attempt start and its task.started land
    h.pump().await;
    assert_eq!(h.task(&task_id).status, TaskStatus::Working);
    h.send(Event::TaskCancelRequested {
        id: task_id,
        project_id: project.id,
        reason: "user_halt".to_string(),
        by: sw_core::CancelledBy::User,
    });

    // The hanging executor never observes the token; grace expires
    h.advance_and_fire(Duration::from_secs(31));
    h.pump().await;

    let task = h.task(&task_id);
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error.as_deref(), Some("cancellation grace exceeded"));
}

#[tokio::test(start_paused = true)]
async fn cooperative_cancellation_lands_within_grace() {
    let mut h = Harness::with_script(vec![ScriptedStep::BlockUntilCancelled]);
    let project = h.create_project("Todo App");
    let task_id = h.submit_task(&project, AgentKind::Coder);

    h.pump().await;
    assert_eq!(h.task(&task_id).status, TaskStatus::Working);
    h.send(Event::TaskCancelRequested {
        id: task_id,
        project_id: project.id,
        reason: "user_halt".to_string(),
        by: sw_core::CancelledBy::User,
    });
    h.pump().await;

    let task = h.task(&task_id);
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert_eq!(task.error.as_deref(), Some("cancelled by user: user_halt"));
}

#[tokio::test(start_paused = true)]
async fn hitl_expiry_sweep_fails_the_task_and_pauses_the_run() {
    let mut config = EngineConfig::default();
    config.approval_ttl = Some(Duration::from_secs(60));
    let mut h = Harness::with_config(Vec::new(), config);
    let project = h.create_project("Todo App");
    h.send(Event::CounterToggled { project_id: project.id, enabled: true });
    let run_id = h.start_workflow(&project, "greenfield-fullstack");

    let gate = h.sole_pending_approval(&project.id);
    h.respond(gate.id, ApprovalAction::Approve);
    h.pump().await;
    let approval = h.sole_pending_approval(&project.id);
    let task_id = approval.task_id.unwrap();

    // Arm the sweep, let the approval outlive its ttl, then fire
    for effect in h.engine.bootstrap_effects() {
        h.engine.execute(effect).unwrap();
    }
    h.advance_and_fire(Duration::from_secs(90));

    let record = h.engine.state().lock().get_approval(approval.id.as_str()).unwrap().clone();
    assert_eq!(record.status, sw_core::ApprovalStatus::Expired);
    let task = h.task(&task_id);
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error.as_deref(), Some("hitl_timeout"));
    let run = h.run(&run_id);
    assert_eq!(run.status, RunStatus::Paused);
    assert_eq!(run.paused_reason.as_deref(), Some("hitl_timeout"));
}

#[tokio::test(start_paused = true)]
async fn stall_scan_flags_silent_working_tasks() {
    let mut h = Harness::with_script(vec![ScriptedStep::Hang(Duration::from_secs(3600))]);
    let project = h.create_project("Todo App");
    let task_id = h.submit_task(&project, AgentKind::Coder);
    tokio::time::sleep(Duration::from_millis(50)).await;

    for effect in h.engine.bootstrap_effects() {
        h.engine.execute(effect).unwrap();
    }
    // Drain the task.started heartbeat first so the clock gap is real
    h.pump().await;
    h.advance_and_fire(Duration::from_secs(120));

    let stalled: Vec<_> = h
        .log
        .iter()
        .filter(|r| r.kind() == "task.stalled")
        .collect();
    assert_eq!(stalled.len(), 1);
    assert!(matches!(
        &stalled[0].event,
        Event::TaskStalled { id, idle_ms, .. } if *id == task_id && *idle_ms >= 90_000
    ));
}

#[tokio::test(start_paused = true)]
async fn orphaned_working_tasks_are_recovered_at_startup() {
    let mut h = Harness::new();
    let project = h.create_project("Todo App");

    // Fabricate a task that was mid-work when the process died
    let mut orphan = sw_core::Task::builder()
        .project_id(project.id)
        .agent(AgentKind::Analyst)
        .created_at_ms(h.clock.epoch_ms())
        .build();
    orphan.status = TaskStatus::Working;
    orphan.attempt_count = 1;
    orphan.heartbeat_ms = Some(h.clock.epoch_ms());
    let orphan_id = orphan.id;
    h.engine
        .state()
        .lock()
        .tasks
        .insert(orphan_id.as_str().to_string(), orphan);

    // Heartbeat too fresh: left alone
    h.clock.advance(Duration::from_secs(30));
    assert!(h.engine.recover().is_empty());

    // Past the orphan threshold: re-enqueued and it completes
    h.clock.advance(Duration::from_secs(120));
    let effects = h.engine.recover();
    assert!(!effects.is_empty());
    for event in h.engine.execute_all(effects).unwrap() {
        h.send(event);
    }
    h.pump().await;
    assert_eq!(h.task(&orphan_id).status, TaskStatus::Completed);
    assert_eq!(h.task(&orphan_id).attempt_count, 2);
}

#[tokio::test(start_paused = true)]
async fn orphan_out_of_attempts_fails_with_orphaned() {
    let mut h = Harness::new();
    let project = h.create_project("Todo App");

    let mut orphan = sw_core::Task::builder()
        .project_id(project.id)
        .agent(AgentKind::Analyst)
        .created_at_ms(h.clock.epoch_ms())
        .build();
    orphan.status = TaskStatus::Working;
    orphan.attempt_count = 3;
    orphan.heartbeat_ms = Some(h.clock.epoch_ms());
    let orphan_id = orphan.id;
    h.engine
        .state()
        .lock()
        .tasks
        .insert(orphan_id.as_str().to_string(), orphan);

    h.clock.advance(Duration::from_secs(180));
    let effects = h.engine.recover();
    for event in h.engine.execute_all(effects).unwrap() {
        h.send(event);
    }

    let task = h.task(&orphan_id);
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error.as_deref(), Some("orphaned"));
}

#[tokio::test(start_paused = true)]
async fn retry_timer_for_a_cancelled_task_is_inert() {
    let mut h = Harness::with_script(vec![ScriptedStep::Transient("flaky".to_string())]);
    let project = h.create_project("Todo App");
    let task_id = h.submit_task(&project, AgentKind::Analyst);
    h.pump().await;

    // Backoff armed; cancel before it fires
    h.send(Event::TaskCancelRequested {
        id: task_id,
        project_id: project.id,
        reason: "abort".to_string(),
        by: sw_core::CancelledBy::User,
    });
    // Working task: cooperative signal no-ops (attempt already finished),
    // grace expiry fails it
    h.advance_and_fire(Duration::from_secs(31));
    let status_after_grace = h.task(&task_id).status;
    assert!(status_after_grace.is_terminal());

    // The stale retry timer fires into a terminal task: nothing happens
    h.advance_and_fire(Duration::from_secs(5));
    assert_eq!(h.task(&task_id).status, status_after_grace);
    assert_eq!(TimerId::retry(&task_id, 2).parse_retry().unwrap().1, 2);
}
