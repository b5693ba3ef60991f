//! `WebSocket` handlers for live, raw-event, and delayed streams.
//!
//! - `GET /ws/live` sends the authoritative state snapshot on connect and
//!   after every change.
//! - `GET /ws/events` forwards each appended event as it is emitted.
//! - `GET /ws/delayed?delay=N` attaches a dedicated replica per connection
//!   and sends its view whenever it changes. The client may send
//!   `{"delay": N}` to retune the lag mid-stream.
//!
//! If a client falls behind on a broadcast stream, lagged messages are
//! skipped and the client resumes from the newest one.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use onair_core::validation::validate_broadcast_delay;
use onair_events::{ReplicaOptions, spawn_replica};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::error::ObserverError;
use crate::state::AppState;

/// Query parameters for `GET /ws/delayed`.
#[derive(Debug, Deserialize)]
pub struct DelayedQuery {
    /// Lag in seconds, `0..=600`. Defaults to the stored broadcast delay.
    pub delay: Option<i64>,
}

/// Client message on a delayed stream.
#[derive(Debug, Deserialize)]
struct DelayedCommand {
    delay: i64,
}

/// What the client asked for, or that it left.
enum Inbound {
    Continue,
    Text(String),
    Closed,
}

// ---------------------------------------------------------------------------
// GET /ws/live
// ---------------------------------------------------------------------------

/// Upgrade to a live state stream.
pub async fn ws_live(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_live(socket, state))
}

async fn handle_live(mut socket: WebSocket, state: Arc<AppState>) {
    debug!("Live stream client connected");
    let mut revision = state.engine.watch_revision();
    revision.mark_changed();

    loop {
        tokio::select! {
            changed = revision.changed() => {
                if changed.is_err() {
                    return;
                }
                match state.engine.state().await {
                    Ok(snapshot) => {
                        if !send_json(&mut socket, &snapshot).await {
                            return;
                        }
                    }
                    Err(e) => warn!(error = %e, "Live stream could not read state"),
                }
            }
            msg = socket.recv() => match inbound(&mut socket, msg).await {
                Inbound::Closed => return,
                Inbound::Continue | Inbound::Text(_) => {}
            },
        }
    }
}

// ---------------------------------------------------------------------------
// GET /ws/events
// ---------------------------------------------------------------------------

/// Upgrade to a raw event stream.
pub async fn ws_events(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_events(socket, state))
}

async fn handle_events(mut socket: WebSocket, state: Arc<AppState>) {
    debug!("Event stream client connected");
    let mut rx = state.engine.subscribe();

    loop {
        tokio::select! {
            result = rx.recv() => match result {
                Ok(event) => {
                    if !send_json(&mut socket, &event).await {
                        return;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event stream client lagged, skipping ahead");
                }
                Err(RecvError::Closed) => {
                    debug!("Event channel closed, shutting down WebSocket");
                    return;
                }
            },
            msg = socket.recv() => match inbound(&mut socket, msg).await {
                Inbound::Closed => return,
                Inbound::Continue | Inbound::Text(_) => {}
            },
        }
    }
}

// ---------------------------------------------------------------------------
// GET /ws/delayed
// ---------------------------------------------------------------------------

/// Upgrade to a delayed broadcast view.
///
/// The delay is validated before the upgrade, so a bad value is a plain
/// 400 response.
pub async fn ws_delayed(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    params: Result<Query<DelayedQuery>, QueryRejection>,
) -> Result<Response, ObserverError> {
    let Query(params) = params.map_err(|e| ObserverError::InvalidQuery(e.body_text()))?;

    let delay_seconds = match params.delay {
        Some(raw) => validate_broadcast_delay(raw)?,
        None => match state.engine.settings().await {
            Ok(settings) => settings.broadcast_delay_seconds,
            Err(e) => {
                warn!(error = %e, "Settings unavailable, delayed view starts at 0s");
                0
            }
        },
    };

    Ok(ws
        .on_upgrade(move |socket| handle_delayed(socket, state, delay_seconds))
        .into_response())
}

async fn handle_delayed(mut socket: WebSocket, state: Arc<AppState>, delay_seconds: u32) {
    debug!(delay_seconds, "Delayed view client connected");

    let push = state.has_local_push().then(|| state.engine.subscribe());
    let replica = spawn_replica(
        state.events.clone(),
        push,
        state.engine.clock().clone(),
        ReplicaOptions {
            delay_seconds,
            ..state.replica
        },
    );
    let mut view = replica.subscribe();
    view.mark_changed();

    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    return;
                }
                let current = view.borrow_and_update().clone();
                if !send_json(&mut socket, &current).await {
                    return;
                }
            }
            msg = socket.recv() => match inbound(&mut socket, msg).await {
                Inbound::Closed => return,
                Inbound::Continue => {}
                Inbound::Text(text) => {
                    match parse_delay_command(&text) {
                        Ok(seconds) => {
                            if replica.set_delay(seconds).await.is_err() {
                                return;
                            }
                        }
                        Err(reason) => {
                            let error = serde_json::json!({ "error": reason, "status": 400 });
                            if !send_json(&mut socket, &error).await {
                                return;
                            }
                        }
                    }
                }
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Send `value` as a JSON text frame. Returns `false` once the client is gone.
async fn send_json<T: Serialize>(socket: &mut WebSocket, value: &T) -> bool {
    let json = match serde_json::to_string(value) {
        Ok(j) => j,
        Err(e) => {
            warn!("Failed to serialize WebSocket message: {e}");
            return true;
        }
    };
    if socket.send(Message::Text(json.into())).await.is_err() {
        debug!("WebSocket client disconnected (send failed)");
        return false;
    }
    true
}

fn parse_delay_command(text: &str) -> Result<u32, String> {
    let cmd: DelayedCommand = serde_json::from_str(text).map_err(|e| e.to_string())?;
    validate_broadcast_delay(cmd.delay).map_err(|e| e.to_string())
}

/// Handle one client frame: answer pings, surface text, detect closes.
async fn inbound(
    socket: &mut WebSocket,
    msg: Option<Result<Message, axum::Error>>,
) -> Inbound {
    match msg {
        Some(Ok(Message::Close(_))) | None => {
            debug!("WebSocket client disconnected");
            Inbound::Closed
        }
        Some(Ok(Message::Ping(data))) => {
            if socket.send(Message::Pong(data)).await.is_err() {
                debug!("WebSocket client disconnected (pong failed)");
                return Inbound::Closed;
            }
            Inbound::Continue
        }
        Some(Ok(Message::Text(text))) => Inbound::Text(text.as_str().to_owned()),
        Some(Err(e)) => {
            debug!("WebSocket error: {e}");
            Inbound::Closed
        }
        Some(Ok(_)) => Inbound::Continue,
    }
}
