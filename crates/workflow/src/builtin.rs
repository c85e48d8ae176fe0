// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in workflow definitions shipped with the daemon.

use crate::definition::WorkflowDef;
use crate::parser::parse_workflow;

/// The default SDLC flow: each phase opens with a plan gate, then its
/// specialist produces the phase artifact from the previous one.
pub const GREENFIELD_FULLSTACK: &str = r#"
workflow "greenfield-fullstack" {
    description = "Idea to launched product across the five phases"

    step "analyze_plan" {
        phase   = "analyze"
        creates = "analyze_plan"
    }

    step "product_requirement" {
        phase   = "analyze"
        agent   = "analyst"
        creates = "product_requirement"
    }

    step "design_plan" {
        phase   = "design"
        creates = "design_plan"
    }

    step "architecture" {
        phase    = "design"
        agent    = "architect"
        creates  = "architecture"
        requires = ["product_requirement"]
    }

    step "build_plan" {
        phase   = "build"
        creates = "build_plan"
    }

    step "implementation" {
        phase    = "build"
        agent    = "coder"
        creates  = "implementation"
        requires = ["architecture"]
    }

    step "validate_plan" {
        phase   = "validate"
        creates = "validate_plan"
    }

    step "test_report" {
        phase    = "validate"
        agent    = "tester"
        creates  = "test_report"
        requires = ["implementation"]
    }

    step "launch_plan" {
        phase   = "launch"
        creates = "launch_plan"
    }

    step "deployment_report" {
        phase    = "launch"
        agent    = "deployer"
        creates  = "deployment_report"
        requires = ["implementation", "test_report"]
    }
}
"#;

/// All definitions compiled into the binary.
///
/// Built-ins parse at startup; a failure here is a programming error in
/// the embedded source, so it surfaces loudly rather than silently
/// shipping a daemon with no workflows.
pub fn builtin_definitions() -> Vec<WorkflowDef> {
    match parse_workflow(GREENFIELD_FULLSTACK) {
        Ok(defs) => defs,
        Err(e) => {
            tracing::error!(error = %e, "embedded workflow definition failed to parse");
            Vec::new()
        }
    }
}
