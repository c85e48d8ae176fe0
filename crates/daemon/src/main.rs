// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! swd: the Shipwright orchestration daemon.
//!
//! Exit codes: 0 clean shutdown, 1 configuration error, 2 storage
//! unreachable at startup, 3 unrecoverable runtime error.

use sw_daemon::{run, Config};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn main() {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("swd: configuration error: {e}");
            std::process::exit(e.exit_code());
        }
    };

    if let Err(e) = std::fs::create_dir_all(&config.state_dir) {
        eprintln!("swd: cannot create state dir {}: {e}", config.state_dir.display());
        std::process::exit(2);
    }

    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().unwrap_or(&config.state_dir),
        config.log_path.file_name().unwrap_or_else(|| "daemon.log".as_ref()),
    );
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("swd: failed to start runtime: {e}");
            std::process::exit(3);
        }
    };

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            signal_token.cancel();
        }
    });

    match runtime.block_on(run(config, shutdown)) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("swd: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
