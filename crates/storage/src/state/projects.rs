// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project event handlers.

use sw_core::{Event, EventRecord, HitlCounter};

use super::MaterializedState;

pub(crate) fn apply(state: &mut MaterializedState, record: &EventRecord) {
    match &record.event {
        Event::ProjectCreated { project } => {
            // Idempotency: skip if already exists
            if !state.projects.contains_key(project.id.as_str()) {
                state.projects.insert(project.id.as_str().to_string(), project.clone());
            }
            // Counter lifecycle begins with the project: disabled, empty
            state
                .counters
                .entry(project.id.as_str().to_string())
                .or_insert_with(HitlCounter::default);
        }

        Event::WorkflowPhaseChanged { project_id, phase, .. } => {
            if let Some(project) = state.projects.get_mut(project_id.as_str()) {
                project.current_phase = *phase;
            }
        }

        _ => {}
    }
}
