// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent executor capability.
//!
//! The engine never interprets instructions or talks to a model; it hands
//! a [`TaskSpec`] to whatever [`AgentExecutor`] is registered for the
//! task's role and stores what comes back. Prompt content, model choice,
//! and token accounting are entirely the executor's concern.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use sw_core::{AgentKind, Artifact, ArtifactMeta, Event, ProjectId, TaskId};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Everything an executor needs to run one attempt.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub task_id: TaskId,
    pub project_id: ProjectId,
    pub agent: AgentKind,
    pub instructions: String,
    /// Input artifacts, resolved from the task's context ids
    pub inputs: Vec<Artifact>,
    /// Artifact type the step expects, when known
    pub creates: Option<String>,
    pub attempt: u32,
}

/// One artifact produced by an attempt.
#[derive(Debug, Clone)]
pub struct OutputArtifact {
    pub artifact_type: String,
    pub content: serde_json::Value,
    pub metadata: ArtifactMeta,
}

/// Result of a successful attempt.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    /// Structured result recorded on the task
    pub output: Option<serde_json::Value>,
    /// Artifacts to write to the context store. Completing with none is a
    /// contract violation and fails the task.
    pub artifacts: Vec<OutputArtifact>,
}

/// Executor failure, classified for the retry policy.
#[derive(Debug, Clone, Error)]
pub enum ExecError {
    /// Network, rate limit, provider hiccup. Retried with backoff.
    #[error("transient: {0}")]
    Transient(String),
    /// The executor rejected the work or its own output. Terminal.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl ExecError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ExecError::Transient(_))
    }
}

/// Emits `task.progress` heartbeats from inside a running attempt.
///
/// Executors should report at least every 30 s of work; the engine flags
/// the task as stalled after 90 s of silence.
#[derive(Clone)]
pub struct ProgressSender {
    event_tx: mpsc::Sender<Event>,
    task_id: TaskId,
    project_id: ProjectId,
    attempt: u32,
}

impl ProgressSender {
    pub fn new(
        event_tx: mpsc::Sender<Event>,
        task_id: TaskId,
        project_id: ProjectId,
        attempt: u32,
    ) -> Self {
        Self { event_tx, task_id, project_id, attempt }
    }

    /// Report progress. Best effort: a full channel drops the heartbeat
    /// rather than blocking the attempt.
    pub fn report(&self, message: impl Into<String>) {
        let event = Event::TaskProgress {
            id: self.task_id,
            project_id: self.project_id,
            attempt: self.attempt,
            message: Some(message.into()),
            error: None,
        };
        if let Err(e) = self.event_tx.try_send(event) {
            tracing::debug!(task_id = %self.task_id, error = %e, "progress heartbeat dropped");
        }
    }
}

/// Cancellation and progress plumbing handed to each attempt.
pub struct ExecContext {
    /// Cooperative cancellation; check at least every 10 s of work
    pub cancel: CancellationToken,
    pub progress: ProgressSender,
}

/// Executes one attempt of agent work.
///
/// Implementations own everything model-shaped. They are expected to
/// observe `ctx.cancel` promptly; the dispatcher abandons attempts that
/// outlive the grace period anyway.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(&self, spec: TaskSpec, ctx: ExecContext) -> Result<ExecOutput, ExecError>;
}

/// Role → executor dispatch table.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<AgentKind, Arc<dyn AgentExecutor>>,
}

impl ExecutorRegistry {
    /// Register one executor for every role.
    pub fn uniform(executor: Arc<dyn AgentExecutor>) -> Self {
        let mut registry = Self::default();
        for kind in AgentKind::ALL {
            registry.register(kind, Arc::clone(&executor));
        }
        registry
    }

    pub fn register(&mut self, kind: AgentKind, executor: Arc<dyn AgentExecutor>) {
        self.executors.insert(kind, executor);
    }

    pub fn get(&self, kind: AgentKind) -> Option<Arc<dyn AgentExecutor>> {
        self.executors.get(&kind).cloned()
    }
}

/// Stub executor for local runs without a model behind it: echoes the
/// instructions back as the produced artifact.
pub struct EchoExecutor;

#[async_trait]
impl AgentExecutor for EchoExecutor {
    async fn execute(&self, spec: TaskSpec, _ctx: ExecContext) -> Result<ExecOutput, ExecError> {
        let artifact_type = spec
            .creates
            .clone()
            .unwrap_or_else(|| format!("{}_output", spec.agent));
        Ok(ExecOutput {
            output: Some(serde_json::json!({"echo": true})),
            artifacts: vec![OutputArtifact {
                artifact_type,
                content: serde_json::json!({
                    "instructions": spec.instructions,
                    "inputs": spec.inputs.len(),
                }),
                metadata: ArtifactMeta::default(),
            }],
        })
    }
}

// ── Scripted executor for tests ─────────────────────────────────────────

/// One scripted attempt outcome.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    /// Produce one artifact of the step's expected type
    Succeed,
    /// Fail transiently with this message
    Transient(String),
    /// Fail terminally with this message
    Reject(String),
    /// Sleep this long (exercises timeouts), then succeed
    Hang(std::time::Duration),
    /// Wait for cancellation, then return a transient error
    BlockUntilCancelled,
}

/// Test executor that plays back a queue of [`ScriptedStep`]s, one per
/// attempt, succeeding once the script runs out.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct ScriptedExecutor {
    script: parking_lot::Mutex<std::collections::VecDeque<ScriptedStep>>,
}

#[cfg(any(test, feature = "test-support"))]
impl ScriptedExecutor {
    pub fn new(steps: impl IntoIterator<Item = ScriptedStep>) -> Self {
        Self { script: parking_lot::Mutex::new(steps.into_iter().collect()) }
    }

    pub fn push(&self, step: ScriptedStep) {
        self.script.lock().push_back(step);
    }

    fn next_step(&self) -> ScriptedStep {
        self.script.lock().pop_front().unwrap_or(ScriptedStep::Succeed)
    }

    fn succeed(spec: &TaskSpec) -> ExecOutput {
        let artifact_type =
            spec.creates.clone().unwrap_or_else(|| format!("{}_output", spec.agent));
        ExecOutput {
            output: Some(serde_json::json!({"attempt": spec.attempt})),
            artifacts: vec![OutputArtifact {
                artifact_type,
                content: serde_json::json!({"produced_by": spec.agent.to_string()}),
                metadata: ArtifactMeta::default(),
            }],
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl AgentExecutor for ScriptedExecutor {
    async fn execute(&self, spec: TaskSpec, ctx: ExecContext) -> Result<ExecOutput, ExecError> {
        match self.next_step() {
            ScriptedStep::Succeed => Ok(Self::succeed(&spec)),
            ScriptedStep::Transient(message) => Err(ExecError::Transient(message)),
            ScriptedStep::Reject(message) => Err(ExecError::Rejected(message)),
            ScriptedStep::Hang(duration) => {
                tokio::time::sleep(duration).await;
                Ok(Self::succeed(&spec))
            }
            ScriptedStep::BlockUntilCancelled => {
                ctx.cancel.cancelled().await;
                Err(ExecError::Transient("cancelled".to_string()))
            }
        }
    }
}
