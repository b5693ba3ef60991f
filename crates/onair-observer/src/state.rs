//! Shared application state for the API server.
//!
//! [`AppState`] holds the authoritative [`TimerEngine`] plus what each
//! delayed-view connection needs to start its own replica: the event
//! source to read from and the replica tunables.

use std::sync::Arc;

use onair_core::TimerEngine;
use onair_events::{EventSource, ReplicaOptions};

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// The authoritative timer/queue engine.
    pub engine: Arc<TimerEngine>,
    /// Where delayed views read the event log from.
    pub events: EventSource,
    /// Replica tunables. `delay_seconds` is overridden per connection.
    pub replica: ReplicaOptions,
}

impl AppState {
    /// State whose delayed views read the engine's own store.
    pub fn new(engine: Arc<TimerEngine>) -> Self {
        let events = EventSource::Store(engine.store().clone());
        Self {
            engine,
            events,
            replica: ReplicaOptions::new(0),
        }
    }

    /// Read delayed views from `source` instead, e.g. a remote primary.
    #[must_use]
    pub fn with_event_source(mut self, source: EventSource) -> Self {
        self.events = source;
        self
    }

    /// Override the replica tunables.
    #[must_use]
    pub const fn with_replica_options(mut self, options: ReplicaOptions) -> Self {
        self.replica = options;
        self
    }

    /// Whether delayed views can also take live pushes from the engine.
    ///
    /// Only a replica reading the engine's own store sees the same events
    /// the engine broadcasts.
    pub const fn has_local_push(&self) -> bool {
        matches!(self.events, EventSource::Store(_))
    }
}
