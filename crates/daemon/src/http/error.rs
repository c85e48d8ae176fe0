// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sw_engine::RuntimeError;
use sw_storage::{StoreError, WalError};
use sw_wire::ErrorBody;

/// A failed request: stable code, human message, HTTP status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self { status, body: ErrorBody::new(code, message) }
    }

    /// 400 with code `validation`. Never retried, never logged as error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn conflict(code: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.status.as_u16() {
            500..=599 => tracing::warn!(code = %self.body.code, "request failed: {}", self.body.message),
            _ => tracing::debug!(code = %self.body.code, "request rejected: {}", self.body.message),
        }
        (self.status, Json(self.body)).into_response()
    }
}

impl From<RuntimeError> for ApiError {
    fn from(e: RuntimeError) -> Self {
        match &e {
            RuntimeError::ProjectNotFound(_)
            | RuntimeError::TaskNotFound(_)
            | RuntimeError::ApprovalNotFound(_)
            | RuntimeError::DefinitionNotFound(_) => ApiError::not_found(e.to_string()),
            RuntimeError::ProjectTerminal(_) => ApiError::conflict("project_terminal", e.to_string()),
            RuntimeError::AlreadyTerminal(_) => ApiError::conflict("already_terminal", e.to_string()),
            RuntimeError::Halted(_) => ApiError::conflict("halted", e.to_string()),
            RuntimeError::QueueFull => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "queue_full", e.to_string())
            }
            RuntimeError::InvalidRequest(_) => ApiError::validation(e.to_string()),
            RuntimeError::Storage(_) => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "storage_unavailable",
                "storage backend unavailable",
            ),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match &e {
            StoreError::InvalidArtifact(_) => ApiError::validation(e.to_string()),
            StoreError::NotFound(_) => ApiError::not_found(e.to_string()),
            StoreError::StorageUnavailable(_) => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "storage_unavailable",
                "storage backend unavailable",
            ),
        }
    }
}

impl From<WalError> for ApiError {
    fn from(_: WalError) -> Self {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "storage_unavailable",
            "storage backend unavailable",
        )
    }
}
