// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Approval, counter, and emergency-stop event handlers.

use sw_core::{ApprovalStatus, Event, EventRecord, TaskStatus};

use super::MaterializedState;

pub(crate) fn apply(state: &mut MaterializedState, record: &EventRecord) {
    let ts = record.timestamp_ms;
    match &record.event {
        Event::HitlRequested { approval } => {
            if !state.approvals.contains_key(approval.id.as_str()) {
                // At most one pending approval per task: a duplicate request
                // for the same task is dropped, not doubled.
                let already_pending = approval.task_id.is_some()
                    && state
                        .approvals
                        .values()
                        .any(|a| a.task_id == approval.task_id && a.is_pending());
                if already_pending {
                    return;
                }
                state.approvals.insert(approval.id.as_str().to_string(), approval.clone());
            }

            if let Some(task_id) = &approval.task_id {
                if let Some(task) = state.tasks.get_mut(task_id.as_str()) {
                    if task.status.can_transition_to(TaskStatus::WaitingForHitl) {
                        task.status = TaskStatus::WaitingForHitl;
                    }
                }
            }
        }

        Event::HitlResponded { id, action, user_text, .. } => {
            if let Some(approval) = state.approvals.get_mut(id.as_str()) {
                // First response wins; repeats are no-ops
                if approval.is_pending() {
                    approval.status = action.resolved_status();
                    approval.action = Some(*action);
                    approval.user_response.clone_from(user_text);
                    approval.responded_at_ms = Some(ts);
                    approval.resolution_seq = Some(record.seq);
                }
            }
        }

        Event::HitlExpired { id, .. } => {
            if let Some(approval) = state.approvals.get_mut(id.as_str()) {
                if approval.is_pending() {
                    approval.status = ApprovalStatus::Expired;
                    approval.responded_at_ms = Some(ts);
                    approval.resolution_seq = Some(record.seq);
                }
            }
        }

        Event::EmergencyStopActivated { stop } => {
            if !state.stops.contains_key(stop.id.as_str()) {
                state.stops.insert(stop.id.as_str().to_string(), stop.clone());
            }
        }

        Event::EmergencyStopDeactivated { id } => {
            if let Some(stop) = state.stops.get_mut(id.as_str()) {
                if stop.active {
                    stop.active = false;
                    stop.deactivated_at_ms = Some(ts);
                }
            }
        }

        Event::CounterDecremented { project_id, remaining } => {
            let counter = state.counters.entry(project_id.as_str().to_string()).or_default();
            // Assignment, not arithmetic: the event carries the result,
            // so replay is idempotent
            counter.remaining = *remaining;
        }

        Event::CounterRefilled { project_id, remaining } => {
            let counter = state.counters.entry(project_id.as_str().to_string()).or_default();
            counter.remaining = *remaining;
            counter.initial_value = *remaining;
        }

        Event::CounterToggled { project_id, enabled } => {
            let counter = state.counters.entry(project_id.as_str().to_string()).or_default();
            counter.enabled = *enabled;
        }

        // Informational only; the decrement that reached zero was its own event
        Event::CounterExhausted { .. } => {}

        _ => {}
    }
}
