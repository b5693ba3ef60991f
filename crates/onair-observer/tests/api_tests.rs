//! Integration tests for the API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. The engine runs on the in-memory store with a
//! manual clock.

#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::DateTime;
use onair_core::TimerEngine;
use onair_observer::router::build_router;
use onair_observer::state::AppState;
use onair_store::{Fault, MemoryStore, Store};
use onair_types::Clock;
use serde_json::{Value, json};
use tower::ServiceExt;

const START_MS: i64 = 1_700_000_000_000;

struct TestApp {
    memory: Arc<MemoryStore>,
    router: Router,
}

fn make_test_app() -> TestApp {
    let memory = Arc::new(MemoryStore::new());
    let clock = Clock::manual(DateTime::from_timestamp_millis(START_MS).unwrap());
    let engine = Arc::new(TimerEngine::new(Store::Memory(Arc::clone(&memory)), clock));
    let router = build_router(Arc::new(AppState::new(engine)));
    TestApp { memory, router }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    async fn delete(&self, path: &str) -> (StatusCode, Value) {
        self.send(Request::delete(path).body(Body::empty()).unwrap())
            .await
    }

    async fn post(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        self.send(
            Request::post(path)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn start(&self, name: &str, seconds: i64) -> Value {
        let (status, json) = self
            .post(
                "/api/timer/start",
                &json!({ "name": name, "durationSeconds": seconds }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{json}");
        json
    }
}

// =========================================================================
// Status page and state
// =========================================================================

#[tokio::test]
async fn test_index_returns_html() {
    let app = make_test_app();

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.contains("text/html"));
}

#[tokio::test]
async fn test_state_starts_empty() {
    let app = make_test_app();

    let (status, json) = app.get("/api/timer/state").await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["currentTimer"].is_null());
    assert_eq!(json["queue"], json!([]));
    assert!(json["serverTime"].is_string());
}

#[tokio::test]
async fn test_state_store_failure_is_500() {
    let app = make_test_app();
    app.memory.set_failing(Fault::Documents, true);

    let (status, json) = app.get("/api/timer/state").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["status"], 500);
    assert!(json["error"].is_string());
}

// =========================================================================
// Start / queue
// =========================================================================

#[tokio::test]
async fn test_start_then_queue() {
    let app = make_test_app();

    let first = app.start("Team A", 30).await;
    assert_eq!(first["timer"]["name"], "Team A");
    assert!(first["queueItem"].is_null());

    let second = app.start("Team B", 45).await;
    assert!(second["timer"].is_null());
    assert_eq!(second["queueItem"]["name"], "Team B");

    let (_, state) = app.get("/api/timer/state").await;
    assert_eq!(state["currentTimer"]["name"], "Team A");
    assert_eq!(state["queue"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_start_accepts_legacy_field_name() {
    let app = make_test_app();

    let (status, json) = app
        .post(
            "/api/timer/start",
            &json!({ "name": "Legacy", "timeInSeconds": 10, "priority": false }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["timer"]["durationSeconds"], 10);
}

#[tokio::test]
async fn test_priority_start_interrupts() {
    let app = make_test_app();
    app.start("Team A", 60).await;

    let (status, json) = app
        .post(
            "/api/timer/start",
            &json!({ "name": "Breaking", "durationSeconds": 20, "priority": true }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["timer"]["name"], "Breaking");

    let (_, state) = app.get("/api/timer/state").await;
    assert_eq!(state["queue"][0]["name"], "Team A");
    assert_eq!(state["queue"][0]["durationSeconds"], 60);
}

#[tokio::test]
async fn test_start_validation_errors() {
    let app = make_test_app();

    for body in [
        json!({ "name": "   ", "durationSeconds": 10 }),
        json!({ "name": "Long", "durationSeconds": 7201 }),
        json!({ "name": "Negative", "durationSeconds": -1 }),
        json!({ "name": "transition", "durationSeconds": 10 }),
        json!({ "name": "Typed", "durationSeconds": "ten" }),
        json!({ "durationSeconds": 10 }),
    ] {
        let (status, json) = app.post("/api/timer/start", &body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(json["status"], 400);
    }

    let (_, state) = app.get("/api/timer/state").await;
    assert!(state["currentTimer"].is_null());
}

// =========================================================================
// Control
// =========================================================================

#[tokio::test]
async fn test_control_pause_is_idempotent() {
    let app = make_test_app();
    app.start("Team A", 30).await;

    let (status, json) = app
        .post("/api/timer/control", &json!({ "action": "pause" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["applied"], true);

    let (status, json) = app
        .post("/api/timer/control", &json!({ "action": "pause" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["applied"], false);

    let (_, state) = app.get("/api/timer/state").await;
    assert_eq!(state["currentTimer"]["paused"], true);
}

#[tokio::test]
async fn test_control_rejects_bad_input() {
    let app = make_test_app();

    let (status, _) = app
        .post("/api/timer/control", &json!({ "action": "launch" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = app
        .post("/api/timer/control", &json!({ "action": "complete" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("timer_id"));

    let (status, _) = app
        .post(
            "/api/timer/control",
            &json!({ "action": "complete", "timerId": "not-a-uuid" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_control_complete_and_stale_complete() {
    let app = make_test_app();
    let started = app.start("Team A", 30).await;
    let timer_id = started["timer"]["id"].as_str().unwrap().to_owned();
    app.start("Team B", 30).await;

    let (status, json) = app
        .post(
            "/api/timer/control",
            &json!({ "action": "complete", "timerId": timer_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["applied"], true);

    let (_, state) = app.get("/api/timer/state").await;
    assert_eq!(state["currentTimer"]["name"], "Team B");

    let (status, json) = app
        .post(
            "/api/timer/control",
            &json!({ "action": "complete", "timerId": timer_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["applied"], false);
}

#[tokio::test]
async fn test_control_reset_clears_everything() {
    let app = make_test_app();
    app.start("Team A", 30).await;
    app.start("Team B", 30).await;

    let (status, _) = app
        .post("/api/timer/control", &json!({ "action": "reset" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, state) = app.get("/api/timer/state").await;
    assert!(state["currentTimer"].is_null());
    assert_eq!(state["queue"], json!([]));
}

// =========================================================================
// Settings
// =========================================================================

#[tokio::test]
async fn test_settings_default_to_zero() {
    let app = make_test_app();

    let (status, json) = app.get("/api/settings").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["transitionDelaySeconds"], 0);
    assert_eq!(json["broadcastDelaySeconds"], 0);
}

#[tokio::test]
async fn test_settings_partial_update() {
    let app = make_test_app();

    let (status, json) = app
        .post("/api/settings", &json!({ "transitionDelay": 5 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["transitionDelaySeconds"], 5);
    assert_eq!(json["broadcastDelaySeconds"], 0);

    let (status, json) = app
        .post("/api/settings", &json!({ "broadcastDelaySeconds": 600 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["transitionDelaySeconds"], 5);
    assert_eq!(json["broadcastDelaySeconds"], 600);
}

#[tokio::test]
async fn test_settings_out_of_range_writes_nothing() {
    let app = make_test_app();

    let (status, json) = app
        .post(
            "/api/settings",
            &json!({ "transitionDelay": 10, "broadcastDelay": 601 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);

    let (status, _) = app
        .post("/api/settings", &json!({ "transitionDelay": 61 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, json) = app.get("/api/settings").await;
    assert_eq!(json["transitionDelaySeconds"], 0);
    assert_eq!(json["broadcastDelaySeconds"], 0);
}

// =========================================================================
// Event log
// =========================================================================

#[tokio::test]
async fn test_list_events_in_order() {
    let app = make_test_app();
    app.start("Team A", 30).await;
    app.start("Team B", 30).await;

    let (status, json) = app.get("/api/events").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(json["events"][0]["type"], "TIMER_START");
    assert_eq!(json["events"][0]["payload"]["name"], "Team A");
    assert_eq!(json["events"][1]["type"], "QUEUE_ADD");
}

#[tokio::test]
async fn test_list_events_limit_and_since() {
    let app = make_test_app();
    app.start("Team A", 30).await;
    app.start("Team B", 30).await;

    let (_, json) = app.get("/api/events?limit=1").await;
    assert_eq!(json["count"], 1);

    let (_, json) = app.get("/api/events?limit=5000").await;
    assert_eq!(json["count"], 2);

    let later = START_MS + 1;
    let (_, json) = app.get(&format!("/api/events?since={later}")).await;
    assert_eq!(json["count"], 0);

    let (status, json) = app.get("/api/events?since=yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn test_list_events_continues_after_id_within_one_millisecond() {
    let app = make_test_app();
    app.start("Team A", 30).await;
    app.start("Team B", 30).await;

    let (_, first) = app.get(&format!("/api/events?since={START_MS}&limit=1")).await;
    assert_eq!(first["events"][0]["type"], "TIMER_START");
    let last_id = first["events"][0]["id"].as_str().unwrap().to_owned();

    let (status, rest) = app
        .get(&format!("/api/events?since={START_MS}&after={last_id}&limit=1"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rest["count"], 1);
    assert_eq!(rest["events"][0]["type"], "QUEUE_ADD");

    let (status, json) = app.get("/api/events?after=not-an-id").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn test_delete_events_requires_before() {
    let app = make_test_app();

    let (status, json) = app.delete("/api/events").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("before"));
}

#[tokio::test]
async fn test_delete_events_before() {
    let app = make_test_app();
    app.start("Team A", 30).await;
    app.start("Team B", 30).await;

    let (status, json) = app.delete(&format!("/api/events?before={START_MS}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["deleted"], 0);

    let after = START_MS + 1;
    let (status, json) = app.delete(&format!("/api/events?before={after}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["deleted"], 2);

    let (_, json) = app.get("/api/events").await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = make_test_app();

    let (status, _) = app.get("/api/nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
