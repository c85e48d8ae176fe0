// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine tuning knobs.

use std::time::Duration;

/// Engine configuration. `Default` carries the documented production
/// values; tests shrink the durations.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Concurrent agent attempts across all projects
    pub worker_pool_size: usize,
    /// Soft deadline per attempt
    pub attempt_timeout: Duration,
    /// Attempts per task before the scheduler gives up (includes the first)
    pub attempt_ceiling: u32,
    /// Base for exponential retry backoff: base, 2×base, 4×base
    pub retry_backoff_base: Duration,
    /// Cooperative-cancellation grace before forcible abandonment
    pub cancel_grace: Duration,
    /// Working tasks silent this long get a `task.stalled` indicator
    pub stall_after: Duration,
    /// Working tasks whose heartbeat is older than this at startup are orphans
    pub orphan_after: Duration,
    /// Workflow-level retries per step, beyond the scheduler's attempts
    pub workflow_retry_limit: u32,
    /// Period of the approval-expiry and stall sweeps
    pub sweep_interval: Duration,
    /// How long an approval waits before expiring; None = forever
    pub approval_ttl: Option<Duration>,
    /// Pending-task high-water mark; submissions beyond it are refused
    pub queue_high_water: usize,
    /// Per-subscriber outstanding-event queue size
    pub subscriber_queue: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: default_pool_size(),
            attempt_timeout: Duration::from_secs(5 * 60),
            attempt_ceiling: 3,
            retry_backoff_base: Duration::from_secs(1),
            cancel_grace: Duration::from_secs(30),
            stall_after: Duration::from_secs(90),
            orphan_after: Duration::from_secs(2 * 60),
            workflow_retry_limit: 1,
            sweep_interval: Duration::from_secs(30),
            approval_ttl: None,
            queue_high_water: 1024,
            subscriber_queue: 1024,
        }
    }
}

impl EngineConfig {
    /// Backoff before retrying after a failed `attempt`: 1 s, 2 s, 4 s.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff_base * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

fn default_pool_size() -> usize {
    std::thread::available_parallelism().map(|n| n.get() * 2).unwrap_or(8)
}
