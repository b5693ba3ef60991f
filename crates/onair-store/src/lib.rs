//! Data layer for the `OnAir` countdown system.
//!
//! `PostgreSQL` holds timers, the queue, and the append-only event log.
//! `Dragonfly` holds the two operator settings. An in-memory backend with
//! the same contract serves tests and single-node development.
//!
//! # Architecture
//!
//! ```text
//! Engine / Replicas / API
//!     |
//!     +-- Store (enum dispatch)
//!         |-- Memory   --> MemoryStore (tokio RwLock tables)
//!         +-- Durable
//!             |-- TimerStore   (timers, queue_items)  --> PostgreSQL
//!             |-- EventStore   (events)               --> PostgreSQL
//!             +-- DragonflyPool (settings:*)          --> Dragonfly
//! ```
//!
//! # Modules
//!
//! - [`store`] -- Backend-agnostic [`Store`] handle
//! - [`memory`] -- In-memory backend with fault injection
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`timer_store`] -- Timer and queue tables
//! - [`event_store`] -- Event log table
//! - [`dragonfly`] -- `Dragonfly` settings keys
//! - [`error`] -- Shared error types

pub mod dragonfly;
pub mod error;
pub mod event_store;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod timer_store;

// Re-export primary types for convenience.
pub use dragonfly::DragonflyPool;
pub use error::StoreError;
pub use event_store::{EventRow, EventStore};
pub use memory::{Fault, MemoryStore};
pub use postgres::PostgresPool;
pub use store::{DurableStore, Store};
pub use timer_store::{QueueItemRow, TimerRow, TimerStore};
