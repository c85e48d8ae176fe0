// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sw-engine: The active core of Shipwright.
//!
//! Event in, effects out: the [`Engine`] folds each persisted event into
//! workflow decisions (advance a run, dispatch a task, request an
//! approval) and hands the side effects back to the daemon loop. Around
//! it sit the [`EventFabric`] (subscriber fan-out), the [`HitlGate`]
//! (approval triggers), the [`Scheduler`] (timers), and the
//! [`Dispatcher`] (agent worker pool).

mod config;
mod dispatch;
mod error;
mod executor;
mod fabric;
mod gate;
mod runtime;
mod scheduler;

pub use config::EngineConfig;
pub use dispatch::Dispatcher;
pub use error::RuntimeError;
pub use executor::{
    AgentExecutor, EchoExecutor, ExecContext, ExecError, ExecOutput, ExecutorRegistry,
    OutputArtifact, ProgressSender, TaskSpec,
};
pub use fabric::{EventFabric, FabricMessage, SubscribeScope, Subscription};
pub use gate::{GateDecision, HitlGate, PhasePolicy, PolicyRule, PolicyVerdict};
pub use runtime::Engine;
pub use scheduler::Scheduler;

#[cfg(any(test, feature = "test-support"))]
pub use executor::{ScriptedExecutor, ScriptedStep};
