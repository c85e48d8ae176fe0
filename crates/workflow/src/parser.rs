// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow definition parsing.
//!
//! HCL is the primary format; TOML expresses the same structure for
//! projects that prefer it. Both deserialize through raw serde shapes and
//! converge on [`WorkflowDef`].

use crate::condition::parse_condition;
use crate::definition::{DefinitionError, StepDef, WorkflowDef};
use indexmap::IndexMap;
use serde::Deserialize;
use std::str::FromStr;
use sw_core::{AgentKind, Phase};
use thiserror::Error;

/// Serialization format of a definition file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Hcl,
    Toml,
}

impl Format {
    /// Guess from a file extension; defaults to HCL.
    pub fn from_extension(ext: Option<&str>) -> Format {
        match ext {
            Some("toml") => Format::Toml,
            _ => Format::Hcl,
        }
    }
}

/// Errors from parsing workflow definitions
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("HCL parse error: {0}")]
    Hcl(#[from] hcl::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("workflow {workflow}, step {step}: {error}")]
    BadAgent { workflow: String, step: String, error: sw_core::agent::UnknownAgent },
    #[error("workflow {workflow}, step {step}: {error}")]
    BadPhase { workflow: String, step: String, error: sw_core::phase::UnknownPhase },
    #[error("workflow {workflow}, step {step}: bad condition: {error}")]
    BadCondition { workflow: String, step: String, error: crate::condition::ConditionError },
    #[error(transparent)]
    Definition(#[from] DefinitionError),
}

/// Step body shared by both raw formats.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawStep {
    #[serde(default)]
    phase: Option<String>,
    #[serde(default)]
    agent: Option<String>,
    #[serde(default)]
    creates: Option<String>,
    #[serde(default)]
    requires: Vec<String>,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    approval: bool,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    repeatable: bool,
    #[serde(default)]
    parallel_group: Option<String>,
    #[serde(default)]
    instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawHclWorkflow {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    step: IndexMap<String, RawStep>,
}

#[derive(Debug, Deserialize)]
struct RawHclFile {
    #[serde(default)]
    workflow: IndexMap<String, RawHclWorkflow>,
}

#[derive(Debug, Deserialize)]
struct RawTomlStep {
    name: String,
    #[serde(flatten)]
    body: RawStep,
}

#[derive(Debug, Deserialize)]
struct RawTomlWorkflow {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    step: Vec<RawTomlStep>,
}

#[derive(Debug, Deserialize)]
struct RawTomlFile {
    #[serde(default)]
    workflow: IndexMap<String, RawTomlWorkflow>,
}

/// Parse definitions from HCL source.
pub fn parse_workflow(input: &str) -> Result<Vec<WorkflowDef>, ParseError> {
    parse_workflow_with_format(input, Format::Hcl)
}

/// Parse definitions from source in the given format.
pub fn parse_workflow_with_format(
    input: &str,
    format: Format,
) -> Result<Vec<WorkflowDef>, ParseError> {
    let raw: Vec<(String, Option<String>, Vec<(String, RawStep)>)> = match format {
        Format::Hcl => {
            let file: RawHclFile = hcl::from_str(input)?;
            file.workflow
                .into_iter()
                .map(|(name, wf)| (name, wf.description, wf.step.into_iter().collect()))
                .collect()
        }
        Format::Toml => {
            let file: RawTomlFile = toml::from_str(input)?;
            file.workflow
                .into_iter()
                .map(|(name, wf)| {
                    (
                        name,
                        wf.description,
                        wf.step.into_iter().map(|s| (s.name, s.body)).collect(),
                    )
                })
                .collect()
        }
    };

    let mut workflows = Vec::with_capacity(raw.len());
    for (name, description, steps) in raw {
        let workflow = convert(name, description, steps)?;
        workflow.validate()?;
        workflows.push(workflow);
    }
    Ok(workflows)
}

fn convert(
    workflow: String,
    description: Option<String>,
    steps: Vec<(String, RawStep)>,
) -> Result<WorkflowDef, ParseError> {
    let mut converted = Vec::with_capacity(steps.len());
    for (step_id, raw) in steps {
        let agent = raw
            .agent
            .as_deref()
            .map(AgentKind::from_str)
            .transpose()
            .map_err(|error| ParseError::BadAgent {
                workflow: workflow.clone(),
                step: step_id.clone(),
                error,
            })?;
        let phase = raw
            .phase
            .as_deref()
            .map(Phase::from_str)
            .transpose()
            .map_err(|error| ParseError::BadPhase {
                workflow: workflow.clone(),
                step: step_id.clone(),
                error,
            })?;
        if let Some(condition) = &raw.condition {
            parse_condition(condition).map_err(|error| ParseError::BadCondition {
                workflow: workflow.clone(),
                step: step_id.clone(),
                error,
            })?;
        }
        converted.push(StepDef {
            id: step_id,
            phase,
            agent,
            creates: raw.creates,
            requires: raw.requires,
            condition: raw.condition,
            approval: raw.approval,
            optional: raw.optional,
            repeatable: raw.repeatable,
            parallel_group: raw.parallel_group,
            instructions: raw.instructions,
        });
    }
    Ok(WorkflowDef { name: workflow, description, steps: converted })
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
