// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sw-daemon: The Shipwright orchestration daemon (`swd`).
//!
//! Assembly and process shell around the library crates: configuration,
//! the WAL-backed event bus, the engine loop (the single consumer that
//! applies, handles, and fans out every event), the HTTP + WebSocket
//! surface, and startup/shutdown with crash recovery.

pub mod env;
pub mod event_bus;
pub mod http;
pub mod lifecycle;

mod engine_loop;

pub use engine_loop::engine_loop;
pub use lifecycle::{startup, Config, DaemonState, LifecycleError, StartupResult};

use tokio_util::sync::CancellationToken;

/// Run the daemon until the shutdown token fires.
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<(), LifecycleError> {
    let StartupResult { daemon, event_rx, listener } = startup(config).await?;

    let app = http::router(daemon.app_state());
    let http_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { http_shutdown.cancelled().await })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "http server exited with error");
        }
    });

    let result = engine_loop(daemon, event_rx, shutdown.clone()).await;
    shutdown.cancel();
    let _ = server.await;
    result
}
