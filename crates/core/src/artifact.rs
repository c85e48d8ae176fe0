// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Context artifacts: typed, immutable agent outputs.

use crate::agent::AgentKind;
use crate::project::ProjectId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    /// Unique identifier for a context artifact.
    pub struct ArtifactId("art-");
}

/// Free-form artifact metadata.
///
/// The store never interprets this beyond carrying it; `supersedes` is a
/// hint for clients, not enforced versioning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    /// Back-reference to the artifact this one replaces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<ArtifactId>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

/// A typed piece of content produced by an agent.
///
/// Append-only: a new version requires a new id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub project_id: ProjectId,
    pub source_agent: AgentKind,
    pub artifact_type: String,
    /// Opaque structured payload; schema checks (when registered for the
    /// type) run at write time
    pub content: serde_json::Value,
    #[serde(default)]
    pub metadata: ArtifactMeta,
    pub created_at_ms: u64,
}

impl Artifact {
    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            id: self.id,
            project_id: self.project_id,
            source_agent: self.source_agent,
            artifact_type: self.artifact_type.clone(),
            created_at_ms: self.created_at_ms,
        }
    }
}

/// Metadata-only view of an artifact (no content).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub id: ArtifactId,
    pub project_id: ProjectId,
    pub source_agent: AgentKind,
    pub artifact_type: String,
    pub created_at_ms: u64,
}

crate::builder! {
    pub struct ArtifactBuilder => Artifact {
        into {
            artifact_type: String = "product_requirement",
        }
        set {
            project_id: ProjectId = ProjectId::new(),
            source_agent: AgentKind = AgentKind::Analyst,
            content: serde_json::Value = serde_json::json!({"body": "text"}),
            metadata: ArtifactMeta = ArtifactMeta::default(),
            created_at_ms: u64 = 0,
        }
        computed {
            id: ArtifactId = ArtifactId::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_drops_content() {
        let artifact = Artifact::builder().artifact_type("architecture").build();
        let summary = artifact.summary();
        assert_eq!(summary.id, artifact.id);
        assert_eq!(summary.artifact_type, "architecture");
    }

    #[test]
    fn metadata_roundtrips_supersedes() {
        let old = ArtifactId::new();
        let artifact = Artifact::builder()
            .metadata(ArtifactMeta { supersedes: Some(old), labels: HashMap::new() })
            .build();
        let json = serde_json::to_value(&artifact).unwrap();
        let back: Artifact = serde_json::from_value(json).unwrap();
        assert_eq!(back.metadata.supersedes, Some(old));
    }
}
