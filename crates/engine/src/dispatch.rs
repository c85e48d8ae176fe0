// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task dispatcher: runs agent attempts on a bounded worker pool.
//!
//! One attempt = one spawned tokio task racing the executor against its
//! cancellation token and the soft attempt deadline. Everything the
//! attempt learns flows back as events through the bus channel; retry
//! decisions belong to the runtime, not here.

use crate::config::EngineConfig;
use crate::executor::{ExecContext, ExecError, ExecutorRegistry, ProgressSender, TaskSpec};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use sw_core::{
    ArtifactId, CancelledBy, Clock, Event, Task, TaskId,
};
use sw_storage::MaterializedState;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

struct RunningTask {
    token: CancellationToken,
    /// Set immediately after spawn; the map entry must exist before the
    /// attempt can run, or a fast completion would race its own
    /// registration
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    /// Why cancellation was signalled, for the terminal event
    cancel_reason: Mutex<Option<(String, CancelledBy)>>,
}

/// Worker pool executing task attempts.
pub struct Dispatcher<C: Clock> {
    registry: ExecutorRegistry,
    semaphore: Arc<Semaphore>,
    running: Arc<Mutex<HashMap<TaskId, Arc<RunningTask>>>>,
    state: Arc<Mutex<MaterializedState>>,
    event_tx: mpsc::Sender<Event>,
    config: EngineConfig,
    clock: C,
}

impl<C: Clock + 'static> Dispatcher<C> {
    pub fn new(
        registry: ExecutorRegistry,
        state: Arc<Mutex<MaterializedState>>,
        event_tx: mpsc::Sender<Event>,
        config: EngineConfig,
        clock: C,
    ) -> Self {
        Self {
            registry,
            semaphore: Arc::new(Semaphore::new(config.worker_pool_size)),
            running: Arc::new(Mutex::new(HashMap::new())),
            state,
            event_tx,
            config,
            clock,
        }
    }

    /// Number of attempts currently in flight.
    pub fn in_flight(&self) -> usize {
        self.running.lock().len()
    }

    /// Launch one attempt of a task. Returns immediately; the attempt
    /// reports through events.
    pub fn execute(&self, task: Task, attempt: u32) {
        let Some(executor) = self.registry.get(task.agent) else {
            self.emit_blocking(Event::TaskFailed {
                id: task.id,
                project_id: task.project_id,
                error: format!("no executor registered for agent {}", task.agent),
            });
            return;
        };

        let inputs = {
            let state = self.state.lock();
            task.context_ids
                .iter()
                .filter_map(|id| state.artifacts.get(id.as_str()).cloned())
                .collect::<Vec<_>>()
        };

        let token = CancellationToken::new();
        let spec = TaskSpec {
            task_id: task.id,
            project_id: task.project_id,
            agent: task.agent,
            instructions: task.instructions.clone(),
            inputs,
            creates: task.creates.clone(),
            attempt,
        };

        let entry = Arc::new(RunningTask {
            token: token.clone(),
            handle: Mutex::new(None),
            cancel_reason: Mutex::new(None),
        });
        self.running.lock().insert(task.id, Arc::clone(&entry));

        let semaphore = Arc::clone(&self.semaphore);
        let running = Arc::clone(&self.running);
        let event_tx = self.event_tx.clone();
        let attempt_timeout =
            task.deadline_ms.map(std::time::Duration::from_millis).unwrap_or(self.config.attempt_timeout);
        let attempt_ceiling = self.config.attempt_ceiling;
        let clock = self.clock.clone();
        let worker_token = token.clone();

        let handle = tokio::spawn(async move {
            // Queue until a pool slot frees up; cancellation still lands
            let permit = tokio::select! {
                biased;
                () = worker_token.cancelled() => {
                    finish_cancelled(&running, &event_tx, &spec).await;
                    return;
                }
                permit = semaphore.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
            };

            if attempt == 1 {
                send(&event_tx, Event::TaskStarted {
                    id: spec.task_id,
                    project_id: spec.project_id,
                    attempt,
                })
                .await;
            }

            let ctx = ExecContext {
                cancel: worker_token.clone(),
                progress: ProgressSender::new(
                    event_tx.clone(),
                    spec.task_id,
                    spec.project_id,
                    attempt,
                ),
            };

            let outcome = tokio::select! {
                biased;
                () = worker_token.cancelled() => {
                    finish_cancelled(&running, &event_tx, &spec).await;
                    drop(permit);
                    return;
                }
                result = tokio::time::timeout(attempt_timeout, executor.execute(spec.clone(), ctx)) => {
                    match result {
                        Ok(result) => result,
                        Err(_elapsed) => Err(ExecError::Transient("attempt timeout".to_string())),
                    }
                }
            };
            drop(permit);

            match outcome {
                Ok(output) if output.artifacts.is_empty() => {
                    // Completed tasks must produce at least one artifact
                    finish(&running, &spec.task_id);
                    send(&event_tx, Event::TaskFailed {
                        id: spec.task_id,
                        project_id: spec.project_id,
                        error: "executor returned no artifacts".to_string(),
                    })
                    .await;
                }
                Ok(output) => {
                    let now = clock.epoch_ms();
                    let mut artifact_ids: Vec<ArtifactId> = Vec::new();
                    for out in output.artifacts {
                        let artifact = sw_core::Artifact {
                            id: ArtifactId::new(),
                            project_id: spec.project_id,
                            source_agent: spec.agent,
                            artifact_type: out.artifact_type,
                            content: out.content,
                            metadata: out.metadata,
                            created_at_ms: now,
                        };
                        artifact_ids.push(artifact.id);
                        send(&event_tx, Event::ArtifactCreated { artifact }).await;
                    }
                    finish(&running, &spec.task_id);
                    send(&event_tx, Event::TaskProgress {
                        id: spec.task_id,
                        project_id: spec.project_id,
                        attempt,
                        message: None,
                        error: None,
                    })
                    .await;
                    send(&event_tx, Event::TaskCompleted {
                        id: spec.task_id,
                        project_id: spec.project_id,
                        output: output.output,
                        artifact_ids,
                    })
                    .await;
                }
                Err(error) if error.is_transient() && attempt < attempt_ceiling => {
                    // The runtime sees the error on the progress event and
                    // arms the backoff timer for the next attempt
                    finish(&running, &spec.task_id);
                    send(&event_tx, Event::TaskProgress {
                        id: spec.task_id,
                        project_id: spec.project_id,
                        attempt,
                        message: None,
                        error: Some(error.to_string()),
                    })
                    .await;
                }
                Err(error) => {
                    finish(&running, &spec.task_id);
                    if error.is_transient() {
                        send(&event_tx, Event::TaskProgress {
                            id: spec.task_id,
                            project_id: spec.project_id,
                            attempt,
                            message: None,
                            error: Some(error.to_string()),
                        })
                        .await;
                    }
                    send(&event_tx, Event::TaskFailed {
                        id: spec.task_id,
                        project_id: spec.project_id,
                        error: error.to_string(),
                    })
                    .await;
                }
            }
        });

        *entry.handle.lock() = Some(handle);
    }

    /// Signal cooperative cancellation of a running attempt.
    pub fn signal_cancel(&self, task_id: &TaskId, reason: String, by: CancelledBy) {
        let entry = self.running.lock().get(task_id).cloned();
        if let Some(entry) = entry {
            *entry.cancel_reason.lock() = Some((reason, by));
            entry.token.cancel();
        }
    }

    /// Forcibly abandon an attempt that outlived its cancellation grace.
    pub fn abandon(&self, task_id: &TaskId) {
        if let Some(entry) = self.running.lock().remove(task_id) {
            if let Some(handle) = entry.handle.lock().take() {
                handle.abort();
            }
            tracing::warn!(%task_id, "abandoned attempt past cancellation grace");
        }
    }

    /// Whether an attempt for this task is currently tracked.
    pub fn is_running(&self, task_id: &TaskId) -> bool {
        self.running.lock().contains_key(task_id)
    }

    fn emit_blocking(&self, event: Event) {
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            send(&event_tx, event).await;
        });
    }
}

async fn send(event_tx: &mpsc::Sender<Event>, event: Event) {
    if let Err(e) = event_tx.send(event).await {
        tracing::error!(error = %e, "event channel closed, attempt result lost");
    }
}

fn finish(running: &Mutex<HashMap<TaskId, Arc<RunningTask>>>, task_id: &TaskId) {
    running.lock().remove(task_id);
}

async fn finish_cancelled(
    running: &Mutex<HashMap<TaskId, Arc<RunningTask>>>,
    event_tx: &mpsc::Sender<Event>,
    spec: &TaskSpec,
) {
    let reason = running
        .lock()
        .remove(&spec.task_id)
        .and_then(|entry| entry.cancel_reason.lock().clone());
    let (reason, by) =
        reason.unwrap_or_else(|| ("cancelled".to_string(), CancelledBy::System));
    send(event_tx, Event::TaskCancelled {
        id: spec.task_id,
        project_id: spec.project_id,
        reason,
        by,
    })
    .await;
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
