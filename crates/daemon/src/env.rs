// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Daemon version string (from Cargo.toml)
pub const DAEMON_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve state directory: SW_STATE_DIR > XDG_STATE_HOME/shipwright >
/// ~/.local/state/shipwright
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("SW_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("shipwright"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/shipwright"))
}

/// HTTP listen port (default 7440).
pub fn http_port() -> u16 {
    std::env::var("SW_HTTP_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(7440)
}

/// Worker pool size override.
pub fn worker_pool() -> Option<usize> {
    std::env::var("SW_WORKER_POOL").ok().and_then(|s| s.parse::<usize>().ok())
}

/// Per-attempt soft deadline override.
pub fn attempt_timeout() -> Option<Duration> {
    duration_ms("SW_ATTEMPT_TIMEOUT_MS")
}

/// Sweep interval override (approval expiry and stall scans).
pub fn sweep_interval() -> Option<Duration> {
    duration_ms("SW_SWEEP_INTERVAL_MS")
}

/// Approval time-to-live; unset means approvals wait forever.
pub fn approval_ttl() -> Option<Duration> {
    duration_ms("SW_APPROVAL_TTL_MS")
}

/// Checkpoint after this many processed events (default 512).
pub fn checkpoint_every() -> u64 {
    std::env::var("SW_CHECKPOINT_EVERY")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(512)
}

fn duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var).ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn state_dir_prefers_explicit_override() {
        std::env::set_var("SW_STATE_DIR", "/tmp/sw-test");
        assert_eq!(state_dir().unwrap(), PathBuf::from("/tmp/sw-test"));
        std::env::remove_var("SW_STATE_DIR");
    }

    #[test]
    #[serial]
    fn http_port_defaults() {
        std::env::remove_var("SW_HTTP_PORT");
        assert_eq!(http_port(), 7440);
        std::env::set_var("SW_HTTP_PORT", "9000");
        assert_eq!(http_port(), 9000);
        std::env::remove_var("SW_HTTP_PORT");
    }
}
