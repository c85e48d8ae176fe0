// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Definition discovery on disk.
//!
//! Definitions live as `*.hcl` / `*.toml` files in a single directory.
//! Files that fail to parse are logged and skipped so one bad file never
//! hides the rest.

use crate::definition::WorkflowDef;
use crate::parser::{parse_workflow_with_format, Format};
use std::path::Path;
use thiserror::Error;

/// Errors from definition discovery
#[derive(Debug, Error)]
pub enum FindError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Load every definition in a directory, lexicographic file order.
///
/// A missing directory is an empty result, not an error.
pub fn load_dir(dir: &Path) -> Result<Vec<WorkflowDef>, FindError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(FindError::Io { path: dir.display().to_string(), source }),
    };

    let mut paths: Vec<_> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            matches!(p.extension().and_then(|e| e.to_str()), Some("hcl") | Some("toml"))
        })
        .collect();
    paths.sort();

    let mut workflows = Vec::new();
    for path in paths {
        let input = std::fs::read_to_string(&path)
            .map_err(|source| FindError::Io { path: path.display().to_string(), source })?;
        let format = Format::from_extension(path.extension().and_then(|e| e.to_str()));
        match parse_workflow_with_format(&input, format) {
            Ok(mut parsed) => workflows.append(&mut parsed),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping bad workflow file");
            }
        }
    }
    Ok(workflows)
}

/// Find one definition by name in a directory.
pub fn find_workflow(dir: &Path, name: &str) -> Result<Option<WorkflowDef>, FindError> {
    Ok(load_dir(dir)?.into_iter().find(|w| w.name == name))
}

#[cfg(test)]
#[path = "find_tests.rs"]
mod tests;
