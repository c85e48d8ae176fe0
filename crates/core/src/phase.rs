// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coarse workflow phases.

use serde::{Deserialize, Serialize};

/// A coarse workflow stage. Phase transitions are explicit marker steps
/// in the workflow definition; the project tracks the phase it is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Before any workflow has started
    Intake,
    Analyze,
    Design,
    Build,
    Validate,
    Launch,
}

crate::simple_display! {
    Phase {
        Intake => "intake",
        Analyze => "analyze",
        Design => "design",
        Build => "build",
        Validate => "validate",
        Launch => "launch",
    }
}

/// Error returned when a string names no known phase.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown phase: {0}")]
pub struct UnknownPhase(pub String);

impl std::str::FromStr for Phase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "intake" => Ok(Phase::Intake),
            "analyze" => Ok(Phase::Analyze),
            "design" => Ok(Phase::Design),
            "build" => Ok(Phase::Build),
            "validate" => Ok(Phase::Validate),
            "launch" => Ok(Phase::Launch),
            other => Err(UnknownPhase(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parse_display_roundtrip() {
        for s in ["intake", "analyze", "design", "build", "validate", "launch"] {
            assert_eq!(Phase::from_str(s).unwrap().to_string(), s);
        }
        assert!(Phase::from_str("shipit").is_err());
    }
}
