// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sw_core::AgentKind;

fn step(id: &str) -> StepDef {
    StepDef {
        id: id.to_string(),
        phase: None,
        agent: Some(AgentKind::Coder),
        creates: Some(format!("{id}_artifact")),
        requires: Vec::new(),
        condition: None,
        approval: false,
        optional: false,
        repeatable: false,
        parallel_group: None,
        instructions: None,
    }
}

fn gate(id: &str) -> StepDef {
    StepDef { agent: None, ..step(id) }
}

fn workflow(steps: Vec<StepDef>) -> WorkflowDef {
    WorkflowDef { name: "wf".to_string(), description: None, steps }
}

#[test]
fn validate_rejects_empty_workflow() {
    let err = workflow(vec![]).validate().unwrap_err();
    assert!(matches!(err, DefinitionError::Empty(_)));
}

#[test]
fn validate_rejects_duplicate_steps() {
    let err = workflow(vec![step("a"), step("a")]).validate().unwrap_err();
    assert!(matches!(err, DefinitionError::DuplicateStep { .. }));
}

#[test]
fn validate_rejects_gate_with_approval_flag() {
    let mut g = gate("g");
    g.approval = true;
    let err = workflow(vec![g]).validate().unwrap_err();
    assert!(matches!(err, DefinitionError::GateWithApproval { .. }));
}

#[test]
fn validate_rejects_gate_in_parallel_group() {
    let mut g = gate("g");
    g.parallel_group = Some("grp".to_string());
    let err = workflow(vec![g]).validate().unwrap_err();
    assert!(matches!(err, DefinitionError::GateInGroup { .. }));
}

#[test]
fn group_at_returns_singleton_for_ungrouped_step() {
    let wf = workflow(vec![step("a"), step("b")]);
    let (group, next) = wf.group_at(0).unwrap();
    assert_eq!(group.len(), 1);
    assert_eq!(group[0].id, "a");
    assert_eq!(next, 1);
}

#[test]
fn group_at_collects_contiguous_members() {
    let mut b = step("b");
    b.parallel_group = Some("grp".to_string());
    let mut c = step("c");
    c.parallel_group = Some("grp".to_string());
    let wf = workflow(vec![step("a"), b, c, step("d")]);

    let (group, next) = wf.group_at(1).unwrap();
    assert_eq!(group.len(), 2);
    assert_eq!(group[0].id, "b");
    assert_eq!(group[1].id, "c");
    assert_eq!(next, 3);

    assert!(wf.group_at(4).is_none());
}

#[test]
fn group_at_stops_at_different_group() {
    let mut a = step("a");
    a.parallel_group = Some("one".to_string());
    let mut b = step("b");
    b.parallel_group = Some("two".to_string());
    let wf = workflow(vec![a, b]);

    let (group, next) = wf.group_at(0).unwrap();
    assert_eq!(group.len(), 1);
    assert_eq!(next, 1);
}

#[test]
fn instructions_default_from_creates() {
    let s = step("architecture");
    assert_eq!(
        s.build_instructions("Todo App"),
        "Produce the architecture_artifact artifact for Todo App."
    );

    let mut templated = step("x");
    templated.instructions = Some("Design ${project.name} end to end".to_string());
    assert_eq!(templated.build_instructions("Todo App"), "Design Todo App end to end");

    let mut bare = step("cleanup");
    bare.creates = None;
    assert_eq!(bare.build_instructions("Todo App"), "Execute step cleanup for Todo App.");
}

#[test]
fn definition_hash_is_stable_and_content_sensitive() {
    let a = workflow(vec![step("a")]);
    let b = workflow(vec![step("a")]);
    assert_eq!(definition_hash(&a), definition_hash(&b));

    let c = workflow(vec![step("c")]);
    assert_ne!(definition_hash(&a), definition_hash(&c));
}
