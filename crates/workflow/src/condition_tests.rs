// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use std::collections::HashMap;

struct TestScope {
    phase: Phase,
    artifacts: HashMap<String, Value>,
}

impl TestScope {
    fn new(phase: Phase) -> Self {
        Self { phase, artifacts: HashMap::new() }
    }

    fn with(mut self, artifact_type: &str, content: Value) -> Self {
        self.artifacts.insert(artifact_type.to_string(), content);
        self
    }
}

impl ConditionScope for TestScope {
    fn phase(&self) -> Phase {
        self.phase
    }

    fn artifact_content(&self, artifact_type: &str) -> Option<Value> {
        self.artifacts.get(artifact_type).cloned()
    }
}

fn eval(input: &str, scope: &TestScope) -> Result<bool, Unevaluable> {
    parse_condition(input).unwrap().eval(scope)
}

#[test]
fn has_artifact_checks_existence() {
    let scope = TestScope::new(Phase::Build).with("prd_epic", json!({}));
    assert!(eval(r#"has_artifact("prd_epic")"#, &scope).unwrap());
    assert!(!eval(r#"has_artifact("missing")"#, &scope).unwrap());
}

#[test]
fn field_test_compares_values() {
    let scope =
        TestScope::new(Phase::Build).with("prd_epic", json!({"scope": "mvp", "points": 3}));
    assert!(eval(r#"artifact("prd_epic").scope == "mvp""#, &scope).unwrap());
    assert!(!eval(r#"artifact("prd_epic").scope == "full""#, &scope).unwrap());
    assert!(eval(r#"artifact("prd_epic").scope != "full""#, &scope).unwrap());
    assert!(eval(r#"artifact("prd_epic").points == 3"#, &scope).unwrap());
}

#[test]
fn field_test_walks_nested_paths() {
    let scope = TestScope::new(Phase::Build)
        .with("architecture", json!({"db": {"engine": "postgres"}}));
    assert!(eval(r#"artifact("architecture").db.engine == "postgres""#, &scope).unwrap());
}

#[test]
fn field_test_on_missing_artifact_is_unevaluable() {
    let scope = TestScope::new(Phase::Build);
    let err = eval(r#"artifact("ghost").scope == "mvp""#, &scope).unwrap_err();
    assert!(err.0.contains("ghost"));
}

#[test]
fn field_test_on_missing_field_is_unevaluable() {
    let scope = TestScope::new(Phase::Build).with("prd_epic", json!({"scope": "mvp"}));
    let err = eval(r#"artifact("prd_epic").size == 1"#, &scope).unwrap_err();
    assert!(err.0.contains("size"));
}

#[test]
fn phase_test() {
    let scope = TestScope::new(Phase::Validate);
    assert!(eval(r#"phase == "validate""#, &scope).unwrap());
    assert!(!eval(r#"phase == "build""#, &scope).unwrap());
    assert!(eval(r#"phase != "build""#, &scope).unwrap());
}

#[test]
fn boolean_combinators_and_precedence() {
    let scope = TestScope::new(Phase::Build).with("a", json!({})).with("b", json!({}));
    // && binds tighter than ||
    assert!(eval(
        r#"has_artifact("missing") && has_artifact("a") || has_artifact("b")"#,
        &scope
    )
    .unwrap());
    assert!(!eval(
        r#"has_artifact("missing") && (has_artifact("a") || has_artifact("b"))"#,
        &scope
    )
    .unwrap());
    assert!(eval(r#"!has_artifact("missing")"#, &scope).unwrap());
    assert!(eval(r#"!(has_artifact("a") && has_artifact("missing"))"#, &scope).unwrap());
}

#[test]
fn boolean_literals_in_field_tests() {
    let scope = TestScope::new(Phase::Build).with("flags", json!({"beta": true}));
    assert!(eval(r#"artifact("flags").beta == true"#, &scope).unwrap());
    assert!(!eval(r#"artifact("flags").beta == false"#, &scope).unwrap());
}

#[yare::parameterized(
    unknown_predicate = { r#"launch("missiles")"# },
    trailing_garbage  = { r#"has_artifact("a") extra"# },
    bad_cmp           = { r#"phase = "build""# },
    unterminated      = { r#"has_artifact("a"# },
    bare_artifact     = { r#"artifact("a") == 1"# },
    empty             = { "" },
)]
fn parse_errors(input: &str) {
    assert!(parse_condition(input).is_err(), "{input:?} should not parse");
}

#[test]
fn parse_error_reports_position() {
    let err = parse_condition(r#"has_artifact("a") extra"#).unwrap_err();
    assert!(err.at >= 17, "position {} should point at the trailing input", err.at);
}
