// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent roles that execute workflow steps.

use serde::{Deserialize, Serialize};

/// Closed set of specialist agent roles.
///
/// The orchestration core never interprets what a role does; the role is
/// the dispatch key into the executor registry and the subject of
/// phase-policy rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Turns the product idea into requirements artifacts
    Analyst,
    /// Produces architecture and design artifacts
    Architect,
    /// Writes the code
    Coder,
    /// Validates the build
    Tester,
    /// Ships it
    Deployer,
}

crate::simple_display! {
    AgentKind {
        Analyst => "analyst",
        Architect => "architect",
        Coder => "coder",
        Tester => "tester",
        Deployer => "deployer",
    }
}

/// Error returned when a string names no known agent role.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown agent type: {0}")]
pub struct UnknownAgent(pub String);

impl std::str::FromStr for AgentKind {
    type Err = UnknownAgent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analyst" => Ok(AgentKind::Analyst),
            "architect" => Ok(AgentKind::Architect),
            "coder" => Ok(AgentKind::Coder),
            "tester" => Ok(AgentKind::Tester),
            "deployer" => Ok(AgentKind::Deployer),
            other => Err(UnknownAgent(other.to_string())),
        }
    }
}

impl AgentKind {
    /// All roles, in phase order.
    pub const ALL: [AgentKind; 5] = [
        AgentKind::Analyst,
        AgentKind::Architect,
        AgentKind::Coder,
        AgentKind::Tester,
        AgentKind::Deployer,
    ];
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
