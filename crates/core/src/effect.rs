// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effects represent side effects the runtime needs performed.
//!
//! The runtime's event handlers are pure: they read state and return
//! effects. The executor turns effects into the real world — spawning
//! agent attempts, arming timers, emitting follow-up events.

use crate::event::Event;
use crate::hitl::CancelledBy;
use crate::task::{Task, TaskId};
use crate::timer::TimerId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Effects that need to be executed by the runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// Emit an event into the system event bus
    Emit { event: Event },

    /// Run one attempt of a task on the worker pool. Carries the task
    /// snapshot so dispatch never races state application.
    ExecuteTask { task: Task, attempt: u32 },

    /// Signal a working task's cancellation token; the grace timer is the
    /// caller's responsibility
    SignalCancel { task_id: TaskId, reason: String, by: CancelledBy },

    /// Forcibly abandon a working task that outlived its cancellation grace
    AbandonTask { task_id: TaskId },

    /// Set a timer
    SetTimer {
        id: TimerId,
        #[serde(with = "duration_serde")]
        duration: Duration,
    },

    /// Cancel a timer
    CancelTimer { id: TimerId },
}

impl Effect {
    /// Effect name for log spans (e.g., "execute_task", "set_timer")
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Emit { .. } => "emit",
            Effect::ExecuteTask { .. } => "execute_task",
            Effect::SignalCancel { .. } => "signal_cancel",
            Effect::AbandonTask { .. } => "abandon_task",
            Effect::SetTimer { .. } => "set_timer",
            Effect::CancelTimer { .. } => "cancel_timer",
        }
    }

    /// Key-value pairs for structured logging
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Effect::Emit { event } => vec![("event", event.log_summary())],
            Effect::ExecuteTask { task, attempt } => {
                vec![
                    ("task_id", task.id.to_string()),
                    ("agent", task.agent.to_string()),
                    ("attempt", attempt.to_string()),
                ]
            }
            Effect::SignalCancel { task_id, reason, .. } => {
                vec![("task_id", task_id.to_string()), ("reason", reason.clone())]
            }
            Effect::AbandonTask { task_id } => vec![("task_id", task_id.to_string())],
            Effect::SetTimer { id, duration } => vec![
                ("timer_id", id.to_string()),
                ("duration_ms", duration.as_millis().to_string()),
            ],
            Effect::CancelTimer { id } => vec![("timer_id", id.to_string())],
        }
    }

    /// Whether to log at full verbosity. Signaling effects fire constantly
    /// and get the terse form.
    pub fn verbose(&self) -> bool {
        !matches!(self, Effect::Emit { .. } | Effect::SetTimer { .. } | Effect::CancelTimer { .. })
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        duration.as_millis().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_names_and_fields() {
        let task = Task::builder().build();
        let task_id = task.id;
        let effect = Effect::ExecuteTask { task, attempt: 2 };
        assert_eq!(effect.name(), "execute_task");
        let fields = effect.fields();
        assert_eq!(fields[0], ("task_id", task_id.to_string()));
        assert_eq!(fields[2], ("attempt", "2".to_string()));
        assert!(effect.verbose());
    }

    #[test]
    fn timer_effects_are_terse() {
        let effect =
            Effect::SetTimer { id: TimerId::hitl_sweep(), duration: Duration::from_secs(30) };
        assert!(!effect.verbose());
        assert_eq!(effect.fields()[1].1, "30000");
    }

    #[test]
    fn duration_roundtrips_as_millis() {
        let effect =
            Effect::SetTimer { id: TimerId::hitl_sweep(), duration: Duration::from_millis(1500) };
        let json = serde_json::to_string(&effect).unwrap();
        let back: Effect = serde_json::from_str(&json).unwrap();
        assert_eq!(back, effect);
    }
}
