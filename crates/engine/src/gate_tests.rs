// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn input(counter: HitlCounter) -> GateInput<'static> {
    GateInput {
        phase: Phase::Analyze,
        agent: AgentKind::Analyst,
        instructions: "write the PRD",
        step_approval: None,
        stop_active: false,
        counter,
    }
}

#[test]
fn stop_wins_over_everything() {
    let gate = HitlGate::new(PhasePolicy {
        deny: vec![PolicyRule { phase: Phase::Analyze, agent: AgentKind::Analyst }],
        ..Default::default()
    });
    let mut i = input(HitlCounter::refilled(5));
    i.stop_active = true;
    assert_eq!(gate.evaluate(&i), GateDecision::Halt { reason: "emergency_stop".to_string() });
}

#[test]
fn policy_deny_beats_step_gate() {
    let gate = HitlGate::new(PhasePolicy {
        deny: vec![PolicyRule { phase: Phase::Analyze, agent: AgentKind::Analyst }],
        ..Default::default()
    });
    let mut i = input(HitlCounter::default());
    i.step_approval = Some(ApprovalKind::PhaseGate);
    let decision = gate.evaluate(&i);
    assert!(
        matches!(
            decision,
            GateDecision::NeedsApproval { kind: ApprovalKind::PolicyViolation, .. }
        ),
        "{decision:?}"
    );
}

#[test]
fn deny_marker_in_instructions() {
    let gate = HitlGate::new(PhasePolicy {
        deny_markers: vec!["rm -rf".to_string()],
        ..Default::default()
    });
    let mut i = input(HitlCounter::default());
    i.instructions = "please rm -rf the repo";
    assert!(matches!(
        gate.evaluate(&i),
        GateDecision::NeedsApproval { kind: ApprovalKind::PolicyViolation, .. }
    ));
}

#[test]
fn review_marker_forces_pre_execution_review() {
    let gate = HitlGate::new(PhasePolicy {
        review_markers: vec!["production".to_string()],
        ..Default::default()
    });
    let mut i = input(HitlCounter::default());
    i.instructions = "deploy to production";
    assert!(matches!(
        gate.evaluate(&i),
        GateDecision::NeedsApproval { kind: ApprovalKind::PreExecution, .. }
    ));
}

#[test]
fn step_gate_beats_counter() {
    let gate = HitlGate::default();
    let mut i = input(HitlCounter::refilled(5));
    i.step_approval = Some(ApprovalKind::PhaseGate);
    let decision = gate.evaluate(&i);
    assert!(
        matches!(decision, GateDecision::NeedsApproval { kind: ApprovalKind::PhaseGate, .. }),
        "{decision:?}"
    );
}

#[test]
fn exhausted_counter_requires_approval() {
    let gate = HitlGate::default();
    let mut counter = HitlCounter::refilled(2);
    counter.remaining = 0;
    assert!(matches!(
        gate.evaluate(&input(counter)),
        GateDecision::NeedsApproval { kind: ApprovalKind::CounterExpiry, .. }
    ));
}

#[test]
fn counter_with_budget_decrements() {
    let gate = HitlGate::default();
    assert_eq!(
        gate.evaluate(&input(HitlCounter::refilled(2))),
        GateDecision::AutoApprove { decremented: Some(1) }
    );
    assert_eq!(
        gate.evaluate(&input(HitlCounter::refilled(1))),
        GateDecision::AutoApprove { decremented: Some(0) }
    );
}

#[test]
fn disabled_counter_approves_silently() {
    let gate = HitlGate::default();
    assert_eq!(
        gate.evaluate(&input(HitlCounter::default())),
        GateDecision::AutoApprove { decremented: None }
    );
}
