// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live event delivery over WebSocket.
//!
//! One connection per client, optionally project-scoped by path. Clients
//! may narrow the subscription, replay from a cursor after reconnecting,
//! and ping for liveness. A client that falls behind its queue is
//! dropped with a `resync_required` frame and recovers via replay.

use super::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use sw_engine::{FabricMessage, SubscribeScope, Subscription};
use sw_core::ProjectId;
use sw_wire::{ClientMessage, EventFrame, ServerMessage};
use tracing::debug;

pub async fn global(State(app): State<AppState>, upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(move |socket| serve(socket, app, SubscribeScope::Global))
}

pub async fn scoped(
    State(app): State<AppState>,
    Path(project_id): Path<String>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let scope = SubscribeScope::Project(ProjectId::from_string(&project_id));
    upgrade.on_upgrade(move |socket| serve(socket, app, scope))
}

async fn serve(mut socket: WebSocket, app: AppState, mut scope: SubscribeScope) {
    let mut subscription = app.fabric.subscribe(scope);

    loop {
        tokio::select! {
            delivery = subscription.recv() => {
                let message = match delivery {
                    Some(FabricMessage::Event(record)) => {
                        ServerMessage::Event(EventFrame::from(&record))
                    }
                    Some(FabricMessage::ResyncRequired) => ServerMessage::ResyncRequired,
                    None => break,
                };
                if send(&mut socket, &message).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                let Some(Ok(message)) = incoming else { break };
                let Message::Text(text) = message else { continue };
                let parsed: ClientMessage = match serde_json::from_str(text.as_str()) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        debug!(error = %e, "ignoring malformed client message");
                        continue;
                    }
                };
                match parsed {
                    ClientMessage::Ping => {
                        if send(&mut socket, &ServerMessage::Pong).await.is_err() {
                            break;
                        }
                    }
                    ClientMessage::Subscribe { project_id } => {
                        scope = match project_id {
                            Some(raw) => SubscribeScope::Project(ProjectId::from_string(&raw)),
                            None => SubscribeScope::Global,
                        };
                        subscription = resubscribe(&app, &subscription, scope);
                    }
                    ClientMessage::Replay { since } => {
                        let project = match scope {
                            SubscribeScope::Project(id) => Some(id),
                            SubscribeScope::Global => None,
                        };
                        let events: Vec<EventFrame> = app
                            .fabric
                            .replay(project, since)
                            .iter()
                            .map(EventFrame::from)
                            .collect();
                        if send(&mut socket, &ServerMessage::Replay { events }).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
    subscription.cancel();
}

fn resubscribe(app: &AppState, old: &Subscription, scope: SubscribeScope) -> Subscription {
    old.cancel();
    app.fabric.subscribe(scope)
}

async fn send(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), axum::Error> {
    let text = serde_json::to_string(message).unwrap_or_default();
    socket.send(Message::Text(text.into())).await
}
