//! REST API endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/timer/state` | Active timer, queue, server time |
//! | `POST` | `/api/timer/start` | Start or queue a timer |
//! | `POST` | `/api/timer/control` | Pause, resume, skip, reset, complete |
//! | `GET` | `/api/settings` | Current settings |
//! | `POST` | `/api/settings` | Partial settings update |
//! | `GET` | `/api/events` | Events since a timestamp |
//! | `DELETE` | `/api/events` | Delete events before a timestamp |

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse};
use chrono::{DateTime, Utc};
use onair_core::{ControlOutcome, SettingsUpdate, StartOutcome, ValidationError};
use onair_events::EventPage;
use onair_types::{ControlAction, EventId, QueueItem, Timer, TimerId};
use serde::{Deserialize, Serialize};

use crate::error::ObserverError;
use crate::state::AppState;

/// Page size ceiling for `GET /api/events`.
pub const MAX_EVENTS_PER_PAGE: u32 = 1000;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /api/timer/start`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTimerRequest {
    /// Display label.
    pub name: String,
    /// Countdown length, `0..=7200`.
    #[serde(alias = "timeInSeconds")]
    pub duration_seconds: i64,
    /// Interrupt the active timer instead of queueing.
    #[serde(default)]
    pub priority: bool,
}

/// Response body for `POST /api/timer/start`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTimerResponse {
    /// Always `true`; failures use the error body.
    pub ok: bool,
    /// Human-readable summary.
    pub message: String,
    /// The timer that became active, when started.
    pub timer: Option<Timer>,
    /// The queue entry created, when queued.
    pub queue_item: Option<QueueItem>,
}

/// Request body for `POST /api/timer/control`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlRequest {
    /// `pause`, `resume`, `skip`, `reset`, or `complete`.
    pub action: String,
    /// Target of `complete`.
    #[serde(default)]
    pub timer_id: Option<String>,
}

/// Response body for `POST /api/timer/control`.
#[derive(Debug, Serialize)]
struct ControlResponse {
    /// Whether the request was accepted.
    ok: bool,
    /// Whether state changed. `false` for no-ops such as a stale complete.
    applied: bool,
    /// Human-readable message.
    message: String,
}

/// Query parameters for `GET /api/events`.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Unix milliseconds; events at or after this instant (default 0).
    pub since: Option<i64>,
    /// Page size (default and maximum 1000).
    pub limit: Option<u32>,
    /// Event id of the previous page's last event. When set, the page
    /// continues strictly after `(since, after)`.
    pub after: Option<String>,
}

/// Query parameters for `DELETE /api/events`.
#[derive(Debug, Deserialize)]
pub struct DeleteEventsQuery {
    /// Unix milliseconds; events strictly before this instant are deleted.
    pub before: Option<i64>,
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing live state and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = state.engine.clock().now();
    let (current, queued) = match state.engine.state().await {
        Ok(snapshot) => {
            let current = snapshot.current_timer.map_or_else(
                || String::from("idle"),
                |t| {
                    let remaining = t.remaining_seconds_ceil(now);
                    let paused = if t.paused { " (paused)" } else { "" };
                    format!("{} -- {remaining}s left{paused}", t.name)
                },
            );
            (current, snapshot.queue.len().to_string())
        }
        Err(e) => {
            tracing::warn!(error = %e, "Status page could not read state");
            (String::from("unavailable"), String::from("?"))
        }
    };
    let settings = state.engine.settings().await.unwrap_or_default();
    let transition = settings.transition_delay_seconds;
    let broadcast = settings.broadcast_delay_seconds;
    let backend = state.engine.store().backend_name();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>OnAir</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        hr {{ border: none; border-top: 1px solid #30363d; margin: 1.5rem 0; }}
    </style>
</head>
<body>
    <h1>OnAir</h1>
    <p class="subtitle">Broadcast countdown server ({backend} store)</p>

    <div>
        <div class="metric">
            <div class="label">Now playing</div>
            <div class="value">{current}</div>
        </div>
        <div class="metric">
            <div class="label">Queued</div>
            <div class="value">{queued}</div>
        </div>
        <div class="metric">
            <div class="label">Transition delay</div>
            <div class="value">{transition}s</div>
        </div>
        <div class="metric">
            <div class="label">Broadcast delay</div>
            <div class="value">{broadcast}s</div>
        </div>
    </div>

    <hr>

    <h2>API Endpoints</h2>
    <ul>
        <li>GET <a href="/api/timer/state">/api/timer/state</a> -- Live state</li>
        <li>POST /api/timer/start -- Start or queue a timer</li>
        <li>POST /api/timer/control -- Pause, resume, skip, reset, complete</li>
        <li>GET/POST <a href="/api/settings">/api/settings</a> -- Delays</li>
        <li>GET <a href="/api/events">/api/events</a> -- Event log (?since=ms&amp;limit=N)</li>
    </ul>

    <h2>WebSocket</h2>
    <ul>
        <li><code>/ws/live</code> -- Live state stream</li>
        <li><code>/ws/events</code> -- Raw event stream</li>
        <li><code>/ws/delayed?delay=N</code> -- Delayed broadcast view</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// Return `{currentTimer, queue, serverTime}`.
pub async fn get_state(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    Ok(Json(state.engine.state().await?))
}

/// Start a timer, or queue it behind the active one.
pub async fn start_timer(
    State(state): State<Arc<AppState>>,
    body: Result<Json<StartTimerRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ObserverError> {
    let Json(body) = body.map_err(|e| ObserverError::InvalidBody(e.body_text()))?;

    let outcome = state
        .engine
        .start_or_queue(&body.name, body.duration_seconds, body.priority)
        .await?;

    let response = match outcome {
        StartOutcome::Started(timer) => StartTimerResponse {
            ok: true,
            message: if body.priority {
                String::from("Timer started with priority")
            } else {
                String::from("Timer started")
            },
            timer: Some(timer),
            queue_item: None,
        },
        StartOutcome::Queued(item) => StartTimerResponse {
            ok: true,
            message: String::from("Timer queued"),
            timer: None,
            queue_item: Some(item),
        },
    };
    Ok(Json(response))
}

/// Apply an operator control action.
pub async fn control_timer(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ControlRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ObserverError> {
    let Json(body) = body.map_err(|e| ObserverError::InvalidBody(e.body_text()))?;

    let action: ControlAction = body
        .action
        .parse()
        .map_err(|e: onair_types::UnknownVariant| ValidationError::InvalidAction(e.value))?;
    let timer_id = body
        .timer_id
        .as_deref()
        .map(|raw| {
            raw.parse::<TimerId>()
                .map_err(|e| ValidationError::InvalidTimerId(format!("{raw}: {e}")))
        })
        .transpose()?;

    let outcome = state.engine.control(action, timer_id).await?;
    let applied = outcome == ControlOutcome::Applied;
    let message = if applied {
        format!("Timer {} applied", action.as_str())
    } else {
        format!("Timer {} ignored: nothing to do", action.as_str())
    };

    Ok(Json(ControlResponse {
        ok: true,
        applied,
        message,
    }))
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Return the current settings.
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    Ok(Json(state.engine.settings().await?))
}

/// Update some or all settings and echo the stored values.
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SettingsUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, ObserverError> {
    let Json(update) = body.map_err(|e| ObserverError::InvalidBody(e.body_text()))?;
    Ok(Json(state.engine.update_settings(update).await?))
}

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

/// Events with `timestamp >= since`, oldest first, or strictly after
/// `(since, after)` when continuing a page.
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    params: Result<Query<EventsQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ObserverError> {
    let Query(params) = params.map_err(|e| ObserverError::InvalidQuery(e.body_text()))?;

    let since = millis_to_datetime(params.since.unwrap_or(0), "since")?;
    let limit = params
        .limit
        .filter(|l| *l > 0)
        .unwrap_or(MAX_EVENTS_PER_PAGE)
        .min(MAX_EVENTS_PER_PAGE);

    let store = state.engine.store();
    let events = match params.after.as_deref() {
        Some(raw) => {
            let after = raw
                .parse::<EventId>()
                .map_err(|e| ObserverError::InvalidQuery(format!("invalid \"after\" id: {e}")))?;
            store.events_after(since, after, limit).await?
        }
        None => store.events_since(since, limit).await?,
    };
    Ok(Json(EventPage::new(events)))
}

/// Retention cleanup. `before` is required.
pub async fn delete_events(
    State(state): State<Arc<AppState>>,
    params: Result<Query<DeleteEventsQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ObserverError> {
    let Query(params) = params.map_err(|e| ObserverError::InvalidQuery(e.body_text()))?;

    let before = params.before.filter(|ms| *ms > 0).ok_or_else(|| {
        ObserverError::InvalidQuery(String::from("missing \"before\" timestamp parameter"))
    })?;
    let before = millis_to_datetime(before, "before")?;

    let deleted = state.engine.store().delete_events_before(before).await?;
    tracing::info!(deleted, before = %before, "Deleted old events");

    Ok(Json(serde_json::json!({
        "ok": true,
        "deleted": deleted,
        "message": format!("Deleted events before {}", before.to_rfc3339()),
    })))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn millis_to_datetime(ms: i64, field: &str) -> Result<DateTime<Utc>, ObserverError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| ObserverError::InvalidQuery(format!("{field} out of range: {ms}")))
}
