// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::str::FromStr;

#[yare::parameterized(
    analyst   = { AgentKind::Analyst,   "analyst" },
    architect = { AgentKind::Architect, "architect" },
    coder     = { AgentKind::Coder,     "coder" },
    tester    = { AgentKind::Tester,    "tester" },
    deployer  = { AgentKind::Deployer,  "deployer" },
)]
fn display_and_parse_roundtrip(kind: AgentKind, s: &str) {
    assert_eq!(kind.to_string(), s);
    assert_eq!(AgentKind::from_str(s).unwrap(), kind);
}

#[test]
fn parse_rejects_unknown_role() {
    let err = AgentKind::from_str("wizard").unwrap_err();
    assert_eq!(err.0, "wizard");
}

#[test]
fn serde_uses_snake_case_strings() {
    let json = serde_json::to_string(&AgentKind::Analyst).unwrap();
    assert_eq!(json, "\"analyst\"");
    let back: AgentKind = serde_json::from_str("\"deployer\"").unwrap();
    assert_eq!(back, AgentKind::Deployer);
}
