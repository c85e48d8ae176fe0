// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow and step definitions.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sw_core::{AgentKind, Phase};

/// A node in a workflow definition. Immutable at runtime.
///
/// Steps without an `agent` are pure markers: phase gates that pause for
/// human sign-off before the phase's work begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDef {
    /// Step name, unique within the workflow
    pub id: String,
    /// Phase this step belongs to; entering a step whose phase differs
    /// from the project's current phase is a phase transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    /// Agent that executes this step. None marks a gate step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentKind>,
    /// Artifact type this step produces. For gate steps this names the
    /// plan under review and becomes the approval payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creates: Option<String>,
    /// Artifact types consumed; resolved to the latest artifact of each
    /// type when the task is constructed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    /// Restricted boolean expression; a false condition skips the step if
    /// optional, fails the workflow otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Agent steps: require a pre-execution approval before dispatch
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub approval: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub repeatable: bool,
    /// Steps sharing a group id are submitted concurrently and joined
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_group: Option<String>,
    /// Instruction template handed to the agent; defaults to a line
    /// derived from `creates`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl StepDef {
    /// Whether this is an agent-less gate/marker step.
    pub fn is_gate(&self) -> bool {
        self.agent.is_none()
    }

    /// The instructions to hand the agent for this step.
    pub fn build_instructions(&self, project_name: &str) -> String {
        match &self.instructions {
            Some(template) => template.replace("${project.name}", project_name),
            None => match &self.creates {
                Some(creates) => format!("Produce the {creates} artifact for {project_name}."),
                None => format!("Execute step {} for {project_name}.", self.id),
            },
        }
    }
}

/// An ordered workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<StepDef>,
}

/// Definition validation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("workflow {0} has no steps")]
    Empty(String),
    #[error("workflow {workflow} has duplicate step {step}")]
    DuplicateStep { workflow: String, step: String },
    #[error("workflow {workflow}: gate step {step} cannot require approval")]
    GateWithApproval { workflow: String, step: String },
    #[error("workflow {workflow}: parallel group {group} contains gate step {step}")]
    GateInGroup { workflow: String, group: String, step: String },
}

impl WorkflowDef {
    /// Structural checks beyond what parsing enforces.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.steps.is_empty() {
            return Err(DefinitionError::Empty(self.name.clone()));
        }
        let mut seen = std::collections::HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(DefinitionError::DuplicateStep {
                    workflow: self.name.clone(),
                    step: step.id.clone(),
                });
            }
            if step.is_gate() && step.approval {
                // A gate already is an approval; the flag is for agent steps
                return Err(DefinitionError::GateWithApproval {
                    workflow: self.name.clone(),
                    step: step.id.clone(),
                });
            }
            if let (true, Some(group)) = (step.is_gate(), &step.parallel_group) {
                return Err(DefinitionError::GateInGroup {
                    workflow: self.name.clone(),
                    group: group.clone(),
                    step: step.id.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn get_step(&self, id: &str) -> Option<&StepDef> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_at(&self, index: usize) -> Option<&StepDef> {
        self.steps.get(index)
    }

    /// Expand an index to the `[start, end)` bounds of its parallel
    /// group. Ungrouped steps span exactly themselves.
    pub fn group_bounds(&self, index: usize) -> Option<(usize, usize)> {
        let step = self.steps.get(index)?;
        let Some(group) = &step.parallel_group else {
            return Some((index, index + 1));
        };
        let same = |s: &StepDef| s.parallel_group.as_deref() == Some(group.as_str());
        let mut start = index;
        while start > 0 && self.steps.get(start - 1).is_some_and(same) {
            start -= 1;
        }
        let mut end = index + 1;
        while self.steps.get(end).is_some_and(same) {
            end += 1;
        }
        Some((start, end))
    }

    /// The contiguous run of steps sharing `index`'s parallel group.
    ///
    /// A step without a group is a group of one. Returns the slice and
    /// the index just past it.
    pub fn group_at(&self, index: usize) -> Option<(&[StepDef], usize)> {
        let step = self.steps.get(index)?;
        let Some(group) = &step.parallel_group else {
            return Some((&self.steps[index..=index], index + 1));
        };
        let mut end = index + 1;
        while self
            .steps
            .get(end)
            .is_some_and(|s| s.parallel_group.as_deref() == Some(group.as_str()))
        {
            end += 1;
        }
        Some((&self.steps[index..end], end))
    }
}

/// Content hash of a definition: sha-256 over its canonical JSON form.
///
/// Runs record the hash they started with so a definition edited on disk
/// never silently changes an in-flight run.
pub fn definition_hash(def: &WorkflowDef) -> String {
    let canonical = serde_json::to_string(def).unwrap_or_default();
    format!("{:x}", Sha256::digest(canonical.as_bytes()))
}

#[cfg(test)]
#[path = "definition_tests.rs"]
mod tests;
