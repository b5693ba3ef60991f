//! Axum router construction for the `OnAir` API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /api/timer/state` -- live state
/// - `POST /api/timer/start` -- start or queue
/// - `POST /api/timer/control` -- pause, resume, skip, reset, complete
/// - `GET|POST /api/settings` -- delays
/// - `GET|DELETE /api/events` -- event log read and retention
/// - `GET /ws/live`, `/ws/events`, `/ws/delayed` -- streams
///
/// CORS allows any origin so dashboards on other hosts can connect.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // WebSocket
        .route("/ws/live", get(ws::ws_live))
        .route("/ws/events", get(ws::ws_events))
        .route("/ws/delayed", get(ws::ws_delayed))
        // REST API
        .route("/api/timer/state", get(handlers::get_state))
        .route("/api/timer/start", post(handlers::start_timer))
        .route("/api/timer/control", post(handlers::control_timer))
        .route(
            "/api/settings",
            get(handlers::get_settings).post(handlers::update_settings),
        )
        .route(
            "/api/events",
            get(handlers::list_events).delete(handlers::delete_events),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
