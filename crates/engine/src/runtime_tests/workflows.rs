// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sw_workflow::parse_workflow;

#[tokio::test(start_paused = true)]
async fn greenfield_pauses_at_the_analyze_gate() {
    let mut h = Harness::new();
    let project = h.create_project("Todo App");
    let run_id = h.start_workflow(&project, "greenfield-fullstack");

    let kinds = h.kinds_for_project(&project.id);
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

    let approval = h.sole_pending_approval(&project.id);
    assert_eq!(approval.kind, sw_core::ApprovalKind::PhaseGate);
    assert_eq!(approval.task_id, None);
    assert_eq!(approval.request_payload["step_id"], "analyze_plan");
    assert_eq!(h.run(&run_id).status, RunStatus::Paused);
}

#[tokio::test(start_paused = true)]
async fn approving_the_gate_dispatches_the_analyst() {
    let mut h = Harness::new();
    let project = h.create_project("Todo App");
    let run_id = h.start_workflow(&project, "greenfield-fullstack");

    let approval = h.sole_pending_approval(&project.id);
    h.respond(approval.id, ApprovalAction::Approve);
    h.pump().await;

    let kinds = h.kinds_for_project(&project.id);
    for expected in [
        "hitl.responded",
        "workflow.resumed",
        "task.created",
        "task.started",
        "task.completed",
        "artifact.created",
        "workflow.step_completed",
    ] {
        assert!(kinds.contains(&expected), "missing {expected} in {kinds:?}");
    }

    // The analyst's artifact landed in the run snapshot and the run went
    // on to pause at the design gate
    let run = h.run(&run_id);
    assert!(run.context_snapshot.contains_key("product_requirement"));
    assert_eq!(run.status, RunStatus::Paused);
    let next = h.sole_pending_approval(&project.id);
    assert_eq!(next.request_payload["step_id"], "design_plan");
    assert_eq!(h.project(&project.id).current_phase, Phase::Design);
}

#[tokio::test(start_paused = true)]
async fn full_workflow_reaches_launch_and_completes() {
    let mut h = Harness::new();
    let project = h.create_project("Todo App");
    let run_id = h.start_workflow(&project, "greenfield-fullstack");

    for _gate in 0..5 {
        let approval = h.sole_pending_approval(&project.id);
        assert_eq!(approval.kind, sw_core::ApprovalKind::PhaseGate);
        h.respond(approval.id, ApprovalAction::Approve);
        h.pump().await;
    }

    let run = h.run(&run_id);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.current_step_index, 10);
    let project = h.project(&project.id);
    assert_eq!(project.status, sw_core::ProjectStatus::Completed);
    assert_eq!(project.current_phase, Phase::Launch);

    // Monotone step index across the whole log
    let mut last = 0usize;
    for record in &h.log {
        if let Event::WorkflowStepCompleted { step_index, .. } = &record.event {
            assert!(*step_index >= last);
            last = *step_index;
        }
    }
}

fn register(h: &Harness, hcl: &str) {
    for def in parse_workflow(hcl).unwrap() {
        h.engine.register_definition(def);
    }
}

#[tokio::test(start_paused = true)]
async fn optional_step_with_false_condition_is_skipped() {
    let mut h = Harness::new();
    register(
        &h,
        r#"
workflow "conditional" {
    step "always" {
        agent   = "analyst"
        creates = "report"
    }
    step "maybe" {
        agent     = "coder"
        creates   = "extra"
        optional  = true
        condition = "has_artifact(\"nonexistent\")"
    }
    step "finish" {
        agent   = "tester"
        creates = "summary"
    }
}
"#,
    );
    let project = h.create_project("App");
    let run_id = h.start_workflow(&project, "conditional");
    h.pump().await;

    let run = h.run(&run_id);
    assert_eq!(run.status, RunStatus::Completed);

    let skipped: Vec<(String, bool)> = h
        .log
        .iter()
        .filter_map(|r| match &r.event {
            Event::WorkflowStepCompleted { step_id, skipped, .. } => {
                Some((step_id.clone(), *skipped))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        skipped,
        vec![
            ("always".to_string(), false),
            ("maybe".to_string(), true),
            ("finish".to_string(), false),
        ]
    );
    // The skipped step never became a task
    let state = h.engine.state();
    let state = state.lock();
    assert_eq!(state.tasks.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn required_step_with_false_condition_fails_the_workflow() {
    let mut h = Harness::new();
    register(
        &h,
        r#"
workflow "strict" {
    step "gated" {
        agent     = "coder"
        creates   = "code"
        condition = "has_artifact(\"approval_memo\")"
    }
}
"#,
    );
    let project = h.create_project("App");
    let run_id = h.start_workflow(&project, "strict");

    assert_eq!(h.run(&run_id).status, RunStatus::Failed);
    assert_eq!(h.project(&project.id).status, sw_core::ProjectStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn condition_routes_on_artifact_fields() {
    let mut h = Harness::new();
    register(
        &h,
        r#"
workflow "routed" {
    step "prd" {
        agent   = "analyst"
        creates = "prd_epic"
    }
    step "mvp_only" {
        agent     = "coder"
        creates   = "implementation"
        optional  = true
        condition = "artifact(\"prd_epic\").produced_by == \"analyst\""
    }
}
"#,
    );
    let project = h.create_project("App");
    let run_id = h.start_workflow(&project, "routed");
    h.pump().await;

    // The scripted executor stamps produced_by, so the condition held
    let run = h.run(&run_id);
    assert_eq!(run.status, RunStatus::Completed);
    let state = h.engine.state();
    let state = state.lock();
    assert_eq!(state.tasks.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn parallel_group_members_run_together_and_join() {
    let mut h = Harness::new();
    register(
        &h,
        r#"
workflow "fanout" {
    step "impl" {
        agent   = "coder"
        creates = "implementation"
    }
    step "unit_tests" {
        agent          = "tester"
        creates        = "unit_report"
        parallel_group = "checks"
    }
    step "integration_tests" {
        agent          = "tester"
        creates        = "integration_report"
        parallel_group = "checks"
    }
    step "ship" {
        agent    = "deployer"
        creates  = "deployment_report"
        requires = ["implementation"]
    }
}
"#,
    );
    let project = h.create_project("App");
    let run_id = h.start_workflow(&project, "fanout");
    h.pump().await;

    let run = h.run(&run_id);
    assert_eq!(run.status, RunStatus::Completed);

    // Both group members became tasks and both reports exist
    let state = h.engine.state();
    let state = state.lock();
    assert_eq!(state.tasks.len(), 4);
    assert!(state.latest_artifact(&project.id, "unit_report").is_some());
    assert!(state.latest_artifact(&project.id, "integration_report").is_some());
}

#[tokio::test(start_paused = true)]
async fn missing_required_input_escalates_to_hitl() {
    let mut h = Harness::new();
    register(
        &h,
        r#"
workflow "needy" {
    step "build" {
        agent    = "coder"
        creates  = "implementation"
        requires = ["architecture"]
    }
}
"#,
    );
    let project = h.create_project("App");
    let run_id = h.start_workflow(&project, "needy");

    assert_eq!(h.run(&run_id).status, RunStatus::Paused);
    let approval = h.sole_pending_approval(&project.id);
    assert_eq!(approval.request_payload["escalation"], "missing_input");
    assert_eq!(approval.request_payload["error"], "missing_input:architecture");

    // Rejecting aborts the run
    h.respond(approval.id, ApprovalAction::Reject);
    assert_eq!(h.run(&run_id).status, RunStatus::Failed);
}
