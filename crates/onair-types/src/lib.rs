//! Shared type definitions for the `OnAir` broadcast countdown system.
//!
//! This crate is the single source of truth for the data model used across
//! the workspace: the live engine, the event log, the delayed replicas, and
//! the HTTP API. Types flow downstream to `TypeScript` via `ts-rs` for the
//! control dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for timers, queue items, and events
//! - [`enums`] -- Timer status, event types, control actions
//! - [`structs`] -- Timers, queue items, events, settings, snapshots
//! - [`clock`] -- Injectable wall clock and millisecond time helpers

pub mod clock;
pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use clock::{Clock, millis_between, seconds_before, shift_millis};
pub use enums::{ControlAction, EventType, TimerStatus, UnknownVariant};
pub use ids::{EventId, QueueItemId, TimerId};
pub use structs::{
    Event, EventKind, EventRecord, MATCH_TIMER_NAME, MAX_BROADCAST_DELAY_SECONDS,
    MAX_TIMER_DURATION_SECONDS, MAX_TRANSITION_DELAY_SECONDS, QueueItem, QueueRemovePayload,
    ReplicaState, ReplicaTimer, ResetAllPayload, Settings, StateSnapshot, TRANSITION_TIMER_NAME,
    Timer, TimerEndPayload, TimerPausePayload, TimerResumePayload, TimerStartPayload,
    TransitionCompletePayload, TransitionStartPayload,
};
