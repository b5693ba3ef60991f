//! Delay replica reconstruction for the `OnAir` countdown system.
//!
//! A delayed view is rebuilt purely from the event log: events are buffered,
//! held until they are `delay` seconds old, then folded into a
//! [`ReplicaState`](onair_types::ReplicaState) in strict `(timestamp, id)`
//! order, each exactly once.
//!
//! - [`fold`] -- Pure `(state, event, now) -> state` replay function
//! - [`reconstructor`] -- Pending buffer, dedup, and maturation
//! - [`source`] -- Event log readers: local store or remote HTTP primary
//! - [`replica`] -- Background actor publishing a [`ReplicaView`]

pub mod fold;
pub mod reconstructor;
pub mod replica;
pub mod source;

pub use fold::fold;
pub use reconstructor::Reconstructor;
pub use replica::{ReplicaClosed, ReplicaHandle, ReplicaOptions, ReplicaView, spawn_replica};
pub use source::{EventPage, EventSource, HttpEventSource, SourceError};
