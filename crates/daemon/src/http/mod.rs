// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket surface.
//!
//! Handlers validate, emit events onto the bus, and read the
//! materialized state; they never mutate entities directly. Internal
//! errors map to stable `{code, message}` bodies without leaking
//! internals.

mod audit;
mod error;
mod events;
mod hitl;
mod projects;

pub use error::ApiError;

use crate::event_bus::EventBus;
use crate::lifecycle::DaemonEngine;
use axum::routing::{delete, get, post};
use axum::Router;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use sw_core::SystemClock;
use sw_engine::EventFabric;
use sw_storage::{ContextStore, MaterializedState};

/// Shared context for all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub state: Arc<Mutex<MaterializedState>>,
    pub engine: Arc<DaemonEngine>,
    pub bus: EventBus,
    pub fabric: Arc<EventFabric>,
    pub store: Arc<ContextStore<SystemClock>>,
    pub start_time: Instant,
}

/// The full route table.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Projects and tasks
        .route("/projects", post(projects::create_project))
        .route("/projects/{id}/status", get(projects::project_status))
        .route("/projects/{id}/tasks", post(projects::submit_task))
        .route("/projects/{id}/tasks/{task_id}/cancel", post(projects::cancel_task))
        .route("/projects/{id}/workflow/{def_id}/start", post(projects::start_workflow))
        // Artifacts
        .route("/projects/{id}/artifacts", post(projects::put_artifact))
        .route("/projects/{id}/artifacts", get(projects::list_artifacts))
        .route("/artifacts/{id}", get(projects::get_artifact))
        // HITL
        .route("/hitl/request-approval", post(hitl::request_approval))
        .route("/hitl/approve/{approval_id}", post(hitl::respond))
        .route("/hitl/pending", get(hitl::pending))
        .route("/hitl/status/{approval_id}", get(hitl::status))
        .route("/hitl/emergency-stop", post(hitl::activate_stop))
        .route("/hitl/emergency-stop/{stop_id}", delete(hitl::deactivate_stop))
        .route("/hitl/project/{id}/summary", get(hitl::summary))
        .route("/hitl/counter/{project_id}", post(hitl::update_counter))
        .route("/hitl/health", get(hitl::health))
        // Audit trail and live events
        .route("/audit/events", get(audit::events))
        .route("/events", get(events::global))
        .route("/events/{project_id}", get(events::scoped))
        .route("/healthz", get(hitl::health))
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_fixtures;

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
