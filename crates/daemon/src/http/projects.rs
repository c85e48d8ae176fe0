// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project, task, workflow, and artifact endpoints.

use super::{ApiError, AppState};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use std::str::FromStr;
use sw_core::{
    AgentKind, ArtifactId, ArtifactMeta, CancelledBy, Clock, Event, Phase, Project, ProjectId,
    ProjectStatus, RunId, RunStatus, SystemClock, Task, TaskId, TaskStatus, WorkflowRun,
};
use sw_storage::ArtifactDraft;
use sw_wire as wire;

pub async fn create_project(
    State(app): State<AppState>,
    Json(body): Json<wire::CreateProjectRequest>,
) -> Result<(StatusCode, Json<wire::ProjectCreated>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::validation("project name is required"));
    }
    let project = Project {
        id: ProjectId::new(),
        name: body.name,
        status: ProjectStatus::Active,
        current_phase: Phase::Intake,
        created_at_ms: SystemClock.epoch_ms(),
    };
    let id = project.id;
    app.bus.send(Event::ProjectCreated { project })?;
    Ok((StatusCode::CREATED, Json(wire::ProjectCreated { project_id: id.to_string() })))
}

pub async fn project_status(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<wire::ProjectStatusResponse>, ApiError> {
    let now = SystemClock.epoch_ms();
    let stall_ms = app.engine.config().stall_after.as_millis() as u64;
    let state = app.state.lock();
    let project = state
        .get_project(&id)
        .ok_or_else(|| ApiError::not_found(format!("project not found: {id}")))?;
    let tasks = state
        .tasks_for_project(&project.id)
        .into_iter()
        .map(|t| wire::TaskEntry::from_task(t, now, stall_ms))
        .collect();
    Ok(Json(wire::ProjectStatusResponse::new(project, tasks)))
}

pub async fn submit_task(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<wire::SubmitTaskRequest>,
) -> Result<(StatusCode, Json<wire::TaskSubmitted>), ApiError> {
    let agent = AgentKind::from_str(&body.agent_type)
        .map_err(|e| ApiError::validation(e.to_string()))?;
    if body.instructions.trim().is_empty() {
        return Err(ApiError::validation("instructions are required"));
    }
    let project = app.engine.require_active_project(&id)?;
    app.engine.check_admission(&project.id)?;

    // Context references must exist and stay within the project
    let context_ids: Vec<ArtifactId> = body
        .context_ids
        .unwrap_or_default()
        .iter()
        .map(|raw| {
            let state = app.state.lock();
            let artifact = state
                .get_artifact(raw)
                .ok_or_else(|| ApiError::validation(format!("unknown context id: {raw}")))?;
            if artifact.project_id != project.id {
                return Err(ApiError::validation(format!(
                    "context id {raw} belongs to another project"
                )));
            }
            Ok(artifact.id)
        })
        .collect::<Result<_, ApiError>>()?;

    let task = Task {
        id: TaskId::new(),
        project_id: project.id,
        run_id: None,
        step_id: None,
        agent,
        status: TaskStatus::Pending,
        instructions: body.instructions,
        creates: None,
        context_ids,
        output: None,
        error: None,
        attempt_count: 0,
        deadline_ms: body.deadline_ms,
        heartbeat_ms: None,
        created_at_ms: SystemClock.epoch_ms(),
        started_at_ms: None,
        completed_at_ms: None,
    };
    let task_id = task.id;
    app.bus.send(Event::TaskCreated { task })?;
    Ok((
        StatusCode::CREATED,
        Json(wire::TaskSubmitted { task_id: task_id.to_string(), status: "submitted".to_string() }),
    ))
}

pub async fn cancel_task(
    State(app): State<AppState>,
    Path((id, task_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let _ = app.engine.require_active_project(&id)?;
    let task = app.engine.check_cancel(&task_id)?;
    app.bus.send(Event::TaskCancelRequested {
        id: task.id,
        project_id: task.project_id,
        reason: "cancel requested".to_string(),
        by: CancelledBy::User,
    })?;
    Ok(Json(serde_json::json!({"task_id": task.id, "status": "cancelling"})))
}

pub async fn start_workflow(
    State(app): State<AppState>,
    Path((id, def_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<wire::WorkflowStarted>), ApiError> {
    let project = app.engine.require_active_project(&id)?;
    let (_, hash) = app
        .engine
        .definition(&def_id)
        .ok_or_else(|| ApiError::not_found(format!("workflow definition not found: {def_id}")))?;

    if let Some(existing) = app.state.lock().run_for_project(&project.id) {
        if !existing.is_terminal() {
            return Err(ApiError::conflict(
                "run_exists",
                format!("project already has an active run: {}", existing.id),
            ));
        }
    }

    let now = SystemClock.epoch_ms();
    let run = WorkflowRun {
        id: RunId::new(),
        project_id: project.id,
        definition_id: def_id,
        definition_hash: hash,
        status: RunStatus::Pending,
        current_step_index: 0,
        context_snapshot: Default::default(),
        step_retries: 0,
        active_tasks: Vec::new(),
        paused_reason: None,
        error: None,
        created_at_ms: now,
        updated_at_ms: now,
    };
    let run_id = run.id;
    app.bus.send(Event::WorkflowStarted { run })?;
    Ok((
        StatusCode::CREATED,
        Json(wire::WorkflowStarted { workflow_run_id: run_id.to_string() }),
    ))
}

pub async fn put_artifact(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<wire::PutArtifactRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let source_agent = AgentKind::from_str(&body.source_agent)
        .map_err(|e| ApiError::validation(e.to_string()))?;
    let project = app.engine.require_active_project(&id)?;
    let artifact_id = app.store.put(ArtifactDraft {
        project_id: project.id,
        source_agent,
        artifact_type: body.artifact_type,
        content: body.content,
        metadata: ArtifactMeta {
            supersedes: body.supersedes.map(ArtifactId::from_string),
            labels: Default::default(),
        },
    })?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({"artifact_id": artifact_id}))))
}

pub async fn list_artifacts(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<sw_core::ArtifactSummary>>, ApiError> {
    let project = {
        let state = app.state.lock();
        state
            .get_project(&id)
            .ok_or_else(|| ApiError::not_found(format!("project not found: {id}")))?
            .clone()
    };
    Ok(Json(app.store.list_for_project(&project.id)))
}

pub async fn get_artifact(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<sw_core::Artifact>, ApiError> {
    Ok(Json(app.store.get(&ArtifactId::from_string(&id))?))
}
