// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer scheduling.
//!
//! The engine loop polls [`Scheduler::fired_timers`] and feeds the
//! resulting events back through the bus, so timers follow the same
//! single-delivery path as everything else.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use sw_core::{Event, TimerId};

/// Pending timers keyed by id. Setting an id that already exists
/// replaces its deadline.
#[derive(Default)]
pub struct Scheduler {
    timers: HashMap<TimerId, Instant>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) a timer.
    pub fn set_timer(&mut self, id: TimerId, duration: Duration, now: Instant) {
        self.timers.insert(id, now + duration);
    }

    /// Disarm a timer. Unknown ids are fine.
    pub fn cancel_timer(&mut self, id: &TimerId) {
        self.timers.remove(id);
    }

    pub fn has_timers(&self) -> bool {
        !self.timers.is_empty()
    }

    /// The soonest deadline, for the loop's sleep.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().min().copied()
    }

    /// Remove and return events for every timer due at `now`.
    ///
    /// Fired order is deterministic (by id) so replayed logs are stable.
    pub fn fired_timers(&mut self, now: Instant) -> Vec<Event> {
        let mut due: Vec<TimerId> = self
            .timers
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        due.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        for id in &due {
            self.timers.remove(id);
        }
        due.into_iter().map(|id| Event::TimerFired { id }).collect()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
