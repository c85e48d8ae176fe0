// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sw_core::{AgentKind, Phase};

const BASIC_HCL: &str = r#"
workflow "demo" {
    description = "two steps"

    step "plan" {
        phase   = "analyze"
        creates = "plan"
    }

    step "requirements" {
        phase    = "analyze"
        agent    = "analyst"
        creates  = "prd"
        requires = ["plan"]
    }
}
"#;

const BASIC_TOML: &str = r#"
[workflow.demo]
description = "two steps"

[[workflow.demo.step]]
name = "plan"
phase = "analyze"
creates = "plan"

[[workflow.demo.step]]
name = "requirements"
phase = "analyze"
agent = "analyst"
creates = "prd"
requires = ["plan"]
"#;

#[yare::parameterized(
    hcl  = { BASIC_HCL,  Format::Hcl },
    toml = { BASIC_TOML, Format::Toml },
)]
fn parse_basic_workflow(input: &str, fmt: Format) {
    let workflows = parse_workflow_with_format(input, fmt).unwrap();
    assert_eq!(workflows.len(), 1);
    let wf = &workflows[0];
    assert_eq!(wf.name, "demo");
    assert_eq!(wf.description.as_deref(), Some("two steps"));
    assert_eq!(wf.steps.len(), 2);

    let plan = &wf.steps[0];
    assert_eq!(plan.id, "plan");
    assert!(plan.is_gate());
    assert_eq!(plan.phase, Some(Phase::Analyze));

    let req = &wf.steps[1];
    assert_eq!(req.agent, Some(AgentKind::Analyst));
    assert_eq!(req.requires, vec!["plan"]);
}

#[test]
fn parse_preserves_step_order() {
    let hcl = r#"
workflow "ordered" {
    step "one" { agent = "coder" }
    step "two" { agent = "coder" }
    step "three" { agent = "coder" }
}
"#;
    let wf = &parse_workflow(hcl).unwrap()[0];
    let ids: Vec<&str> = wf.steps.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["one", "two", "three"]);
}

#[test]
fn parse_flags_and_groups() {
    let hcl = r#"
workflow "flags" {
    step "a" {
        agent          = "tester"
        optional       = true
        repeatable     = true
        approval       = true
        parallel_group = "checks"
        condition      = "has_artifact(\"implementation\")"
        instructions   = "Run the suite"
    }
}
"#;
    let wf = &parse_workflow(hcl).unwrap()[0];
    let step = &wf.steps[0];
    assert!(step.optional);
    assert!(step.repeatable);
    assert!(step.approval);
    assert_eq!(step.parallel_group.as_deref(), Some("checks"));
    assert_eq!(step.condition.as_deref(), Some("has_artifact(\"implementation\")"));
    assert_eq!(step.instructions.as_deref(), Some("Run the suite"));
}

#[test]
fn parse_rejects_unknown_agent() {
    let hcl = r#"
workflow "bad" {
    step "a" { agent = "wizard" }
}
"#;
    let err = parse_workflow(hcl).unwrap_err();
    assert!(matches!(err, ParseError::BadAgent { .. }), "{err}");
}

#[test]
fn parse_rejects_unknown_phase() {
    let hcl = r#"
workflow "bad" {
    step "a" {
        agent = "coder"
        phase = "shipping"
    }
}
"#;
    let err = parse_workflow(hcl).unwrap_err();
    assert!(matches!(err, ParseError::BadPhase { .. }), "{err}");
}

#[test]
fn parse_rejects_bad_condition_at_load_time() {
    let hcl = r#"
workflow "bad" {
    step "a" {
        agent     = "coder"
        condition = "launch(\"missiles\")"
    }
}
"#;
    let err = parse_workflow(hcl).unwrap_err();
    assert!(matches!(err, ParseError::BadCondition { .. }), "{err}");
}

#[test]
fn parse_rejects_duplicate_step_names() {
    let toml = r#"
[workflow.bad]

[[workflow.bad.step]]
name = "a"
agent = "coder"

[[workflow.bad.step]]
name = "a"
agent = "tester"
"#;
    let err = parse_workflow_with_format(toml, Format::Toml).unwrap_err();
    assert!(matches!(err, ParseError::Definition(_)), "{err}");
}

#[test]
fn parse_multiple_workflows_in_one_file() {
    let hcl = r#"
workflow "first" {
    step "a" { agent = "coder" }
}

workflow "second" {
    step "b" { agent = "tester" }
}
"#;
    let workflows = parse_workflow(hcl).unwrap();
    assert_eq!(workflows.len(), 2);
    assert_eq!(workflows[0].name, "first");
    assert_eq!(workflows[1].name, "second");
}

#[test]
fn format_guessing_from_extension() {
    assert_eq!(Format::from_extension(Some("toml")), Format::Toml);
    assert_eq!(Format::from_extension(Some("hcl")), Format::Hcl);
    assert_eq!(Format::from_extension(None), Format::Hcl);
}
