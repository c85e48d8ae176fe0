// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A clock that provides the current time
pub trait Clock: Clone + Send + Sync {
    fn now(&self) -> Instant;
    fn epoch_ms(&self) -> u64;
}

/// Real system clock
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Fake clock for testing with controllable time
#[derive(Clone)]
pub struct FakeClock {
    inner: Arc<Mutex<(Instant, u64)>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new((Instant::now(), 1_000_000))) }
    }

    /// Advance the clock by the given duration
    pub fn advance(&self, duration: Duration) {
        let mut inner = self.inner.lock();
        inner.0 += duration;
        inner.1 += duration.as_millis() as u64;
    }

    /// Advance the clock by whole milliseconds
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Set the epoch milliseconds value
    pub fn set_epoch_ms(&self, ms: u64) {
        self.inner.lock().1 = ms;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.inner.lock().0
    }

    fn epoch_ms(&self) -> u64 {
        self.inner.lock().1
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
