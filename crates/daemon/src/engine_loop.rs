// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The engine loop: the single consumer of the WAL.
//!
//! Each record is applied to state (idempotent with the emit-time
//! application), handed to the engine's handlers, and fanned out to
//! subscribers — in that order, exactly once. Effect-produced events are
//! appended back to the WAL and picked up on the next drain iteration,
//! which is what keeps delivery single and ordering causal.

use crate::lifecycle::{DaemonState, LifecycleError};
use std::time::Duration;
use sw_core::Event;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub async fn engine_loop(
    mut daemon: DaemonState,
    mut event_rx: mpsc::Receiver<Event>,
    shutdown: CancellationToken,
) -> Result<(), LifecycleError> {
    // Startup replayed history apply-only; recover whatever handling the
    // crash lost, then arm the sweeps
    drain(&mut daemon)?;
    let bootstrap = daemon
        .engine
        .execute_all(daemon.engine.bootstrap_effects())
        .map_err(|e| LifecycleError::Runtime(e.to_string()))?;
    let recovery = daemon
        .engine
        .execute_all(daemon.engine.recover())
        .map_err(|e| LifecycleError::Runtime(e.to_string()))?;
    for event in bootstrap.into_iter().chain(recovery) {
        daemon.bus.append_quiet(event)?;
    }
    drain(&mut daemon)?;
    info!("engine loop running");

    loop {
        let deadline = daemon.engine.scheduler().lock().next_deadline();
        let sleep = match deadline {
            Some(deadline) => {
                let now = std::time::Instant::now();
                deadline.saturating_duration_since(now)
            }
            None => Duration::from_secs(3600),
        };

        tokio::select! {
            () = shutdown.cancelled() => break,
            maybe_event = event_rx.recv() => {
                match maybe_event {
                    Some(event) => { daemon.bus.send(event)?; }
                    None => break,
                }
            }
            () = daemon.bus.notified() => {}
            () = tokio::time::sleep(sleep) => {
                let now = std::time::Instant::now();
                let fired = daemon.engine.scheduler().lock().fired_timers(now);
                for event in fired {
                    daemon.bus.append_quiet(event)?;
                }
            }
        }

        drain(&mut daemon)?;
        daemon.maybe_checkpoint();
    }

    daemon.shutdown()
}

/// Process every unhandled WAL record, in order.
fn drain(daemon: &mut DaemonState) -> Result<(), LifecycleError> {
    while let Some(record) = daemon.bus.next_unprocessed()? {
        debug!(seq = record.seq, kind = record.kind(), "processing");
        daemon.state.lock().apply_record(&record);

        match daemon.engine.handle_record(&record) {
            Ok(effects) => match daemon.engine.execute_all(effects) {
                Ok(events) => {
                    for event in events {
                        daemon.bus.append_quiet(event)?;
                    }
                }
                Err(e) => error!(seq = record.seq, error = %e, "effect execution failed"),
            },
            // A handler error must not wedge the loop; the record is
            // still marked processed and the failure is in the log
            Err(e) => error!(seq = record.seq, kind = record.kind(), error = %e, "handler failed"),
        }

        daemon.fabric.publish(&record);
        daemon.bus.mark_processed(record.seq);
    }
    // Make buffered appends durable before going back to sleep
    daemon.bus.wal.lock().flush()?;
    Ok(())
}
