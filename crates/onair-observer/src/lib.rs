//! Control and observer API server for the `OnAir` countdown system.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Control REST endpoints** for starting, queueing, and controlling
//!   timers, and for the two delay settings
//! - **Event log endpoints** for delayed replicas on other hosts and for
//!   retention cleanup
//! - **`WebSocket` streams**: live state (`/ws/live`), raw events
//!   (`/ws/events`), and a per-connection delayed view (`/ws/delayed`)
//! - **Minimal HTML status page** (`GET /`)
//!
//! Every request goes through the shared [`TimerEngine`]; the API layer
//! only decodes input and maps errors to status codes.
//!
//! [`TimerEngine`]: onair_core::TimerEngine

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ObserverError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, bind, serve, start_server};
pub use state::AppState;
