// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The HITL endpoints.

use super::{ApiError, AppState};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use std::collections::BTreeMap;
use std::str::FromStr;
use sw_core::{
    AgentKind, Approval, ApprovalAction, ApprovalId, ApprovalKind, ApprovalStatus, Clock,
    EmergencyStop, Event, StopId, StopScope, SystemClock,
};
use sw_wire as wire;

pub async fn request_approval(
    State(app): State<AppState>,
    Json(body): Json<wire::RequestApprovalRequest>,
) -> Result<(StatusCode, Json<wire::ApprovalCreated>), ApiError> {
    let agent = AgentKind::from_str(&body.agent_type)
        .map_err(|e| ApiError::validation(e.to_string()))?;
    let project = app.engine.require_active_project(&body.project_id)?;
    let task = {
        let state = app.state.lock();
        let task = state
            .get_task(&body.task_id)
            .ok_or_else(|| ApiError::not_found(format!("task not found: {}", body.task_id)))?;
        if task.project_id != project.id {
            return Err(ApiError::validation("task belongs to another project"));
        }
        if task.is_terminal() {
            return Err(ApiError::conflict("already_terminal", "task is terminal"));
        }
        if state.pending_approval_for_task(task.id.as_str()).is_some() {
            return Err(ApiError::conflict(
                "approval_pending",
                "task already has a pending approval",
            ));
        }
        task.clone()
    };

    let now = SystemClock.epoch_ms();
    let approval = Approval {
        id: ApprovalId::new(),
        project_id: project.id,
        task_id: Some(task.id),
        agent,
        kind: ApprovalKind::PreExecution,
        request_payload: serde_json::json!({
            "instructions": body.instructions,
            "estimated_tokens": body.estimated_tokens,
        }),
        status: ApprovalStatus::Pending,
        action: None,
        user_response: None,
        created_at_ms: now,
        expires_at_ms: app
            .engine
            .config()
            .approval_ttl
            .map(|ttl| now + ttl.as_millis() as u64),
        responded_at_ms: None,
        resolution_seq: None,
    };
    let approval_id = approval.id;
    app.bus.send(Event::HitlRequested { approval })?;
    Ok((
        StatusCode::CREATED,
        Json(wire::ApprovalCreated { approval_id: approval_id.to_string() }),
    ))
}

pub async fn respond(
    State(app): State<AppState>,
    Path(approval_id): Path<String>,
    Json(body): Json<wire::RespondRequest>,
) -> Result<Json<wire::RespondOutcome>, ApiError> {
    let action = match body.action.as_str() {
        "approve" => ApprovalAction::Approve,
        "reject" => ApprovalAction::Reject,
        "modify" => ApprovalAction::Modify,
        other => {
            return Err(ApiError::validation(format!("unknown action: {other}")));
        }
    };

    let approval = {
        let state = app.state.lock();
        state
            .get_approval(&approval_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("approval not found: {approval_id}")))?
    };

    // Idempotency: a resolved approval returns its recorded outcome
    // without re-emitting anything
    if !approval.is_pending() {
        return Ok(Json(wire::RespondOutcome {
            status: approval.status.to_string(),
            workflow_resumed: false,
        }));
    }

    let resumes_workflow = action != ApprovalAction::Reject
        && (approval.request_payload.get("gate").is_some()
            || approval
                .task_id
                .and_then(|id| {
                    let state = app.state.lock();
                    state.get_task(id.as_str()).map(|t| t.run_id.is_some())
                })
                .unwrap_or(false));

    app.bus.send(Event::HitlResponded {
        id: approval.id,
        project_id: approval.project_id,
        action,
        user_text: body.user_text,
    })?;

    Ok(Json(wire::RespondOutcome {
        status: action.resolved_status().to_string(),
        workflow_resumed: resumes_workflow,
    }))
}

#[derive(serde::Deserialize)]
pub struct PendingParams {
    #[serde(default)]
    project_id: Option<String>,
}

pub async fn pending(
    State(app): State<AppState>,
    Query(params): Query<PendingParams>,
) -> Result<Json<Vec<wire::ApprovalView>>, ApiError> {
    let state = app.state.lock();
    let views = match params.project_id {
        Some(raw) => {
            let project = state
                .get_project(&raw)
                .ok_or_else(|| ApiError::not_found(format!("project not found: {raw}")))?;
            state.pending_approvals(&project.id).into_iter().map(wire::ApprovalView::from).collect()
        }
        None => {
            let mut pending: Vec<&Approval> =
                state.approvals.values().filter(|a| a.is_pending()).collect();
            pending.sort_by_key(|a| (a.created_at_ms, a.id.as_str().to_string()));
            pending.into_iter().map(wire::ApprovalView::from).collect()
        }
    };
    Ok(Json(views))
}

pub async fn status(
    State(app): State<AppState>,
    Path(approval_id): Path<String>,
) -> Result<Json<wire::ApprovalView>, ApiError> {
    let state = app.state.lock();
    let approval = state
        .get_approval(&approval_id)
        .ok_or_else(|| ApiError::not_found(format!("approval not found: {approval_id}")))?;
    Ok(Json(wire::ApprovalView::from(approval)))
}

pub async fn activate_stop(
    State(app): State<AppState>,
    Json(body): Json<wire::EmergencyStopRequest>,
) -> Result<(StatusCode, Json<wire::StopCreated>), ApiError> {
    if body.reason.trim().is_empty() {
        return Err(ApiError::validation("a reason is required"));
    }
    let scope = if body.scope == "global" {
        StopScope::Global
    } else {
        let state = app.state.lock();
        let project = state
            .get_project(&body.scope)
            .ok_or_else(|| ApiError::not_found(format!("project not found: {}", body.scope)))?;
        StopScope::Project(project.id)
    };

    let stop = EmergencyStop {
        id: StopId::new(),
        scope,
        active: true,
        reason: body.reason,
        created_at_ms: SystemClock.epoch_ms(),
        deactivated_at_ms: None,
    };
    let stop_id = stop.id;
    app.bus.send(Event::EmergencyStopActivated { stop })?;
    Ok((StatusCode::CREATED, Json(wire::StopCreated { stop_id: stop_id.to_string() })))
}

pub async fn deactivate_stop(
    State(app): State<AppState>,
    Path(stop_id): Path<String>,
) -> Result<Json<wire::DeactivatedResponse>, ApiError> {
    let stop = {
        let state = app.state.lock();
        state
            .stops
            .get(stop_id.as_str())
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("stop not found: {stop_id}")))?
    };
    // Idempotent: deactivating twice is fine
    if stop.active {
        app.bus.send(Event::EmergencyStopDeactivated { id: stop.id })?;
    }
    Ok(Json(wire::DeactivatedResponse { deactivated: true }))
}

pub async fn summary(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<wire::HitlSummary>, ApiError> {
    let state = app.state.lock();
    let project = state
        .get_project(&id)
        .ok_or_else(|| ApiError::not_found(format!("project not found: {id}")))?;

    let count = |status: ApprovalStatus| {
        state
            .approvals
            .values()
            .filter(|a| a.project_id == project.id && a.status == status)
            .count()
    };
    Ok(Json(wire::HitlSummary {
        project_id: project.id.to_string(),
        pending: count(ApprovalStatus::Pending),
        approved: count(ApprovalStatus::Approved),
        rejected: count(ApprovalStatus::Rejected),
        modified: count(ApprovalStatus::Modified),
        expired: count(ApprovalStatus::Expired),
        counter: state.counter(&project.id).into(),
        emergency_stop_active: state.active_stop_for(&project.id).is_some(),
    }))
}

pub async fn update_counter(
    State(app): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<wire::CounterUpdateRequest>,
) -> Result<Json<wire::CounterView>, ApiError> {
    let project = app.engine.require_active_project(&project_id)?;
    if body.remaining.is_none() && body.enabled.is_none() {
        return Err(ApiError::validation("nothing to update"));
    }
    if let Some(remaining) = body.remaining {
        app.bus.send(Event::CounterRefilled { project_id: project.id, remaining })?;
    }
    if let Some(enabled) = body.enabled {
        app.bus.send(Event::CounterToggled { project_id: project.id, enabled })?;
    }
    let counter = app.state.lock().counter(&project.id);
    Ok(Json(counter.into()))
}

pub async fn health(State(app): State<AppState>) -> Json<wire::HealthResponse> {
    let mut components = BTreeMap::new();
    components.insert("version".to_string(), crate::env::DAEMON_VERSION.to_string());
    components.insert(
        "uptime_secs".to_string(),
        app.start_time.elapsed().as_secs().to_string(),
    );
    components.insert(
        "wal_seq".to_string(),
        app.bus.wal.lock().write_seq().to_string(),
    );
    components.insert(
        "subscribers".to_string(),
        app.fabric.subscriber_count().to_string(),
    );
    components.insert(
        "workflows".to_string(),
        app.engine.definition_names().join(","),
    );
    Json(wire::HealthResponse { status: "ok".to_string(), components })
}
