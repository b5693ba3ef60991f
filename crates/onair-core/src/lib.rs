//! Authoritative timer/queue engine for the `OnAir` countdown system.
//!
//! This crate owns the single "now playing" slot and the queue behind it:
//!
//! - [`engine`] -- [`TimerEngine`]: start/queue, pause, resume, skip,
//!   complete, reset, and the completion pipeline with transitions
//! - [`validation`] -- Operator input checks
//! - [`settings`] -- Validated partial settings updates
//! - [`expiry`] -- Background task completing timers that ran out
//! - [`retention`] -- Event log retention sweeper
//! - [`config`] -- YAML configuration loading
//! - [`error`] -- Engine error type

pub mod config;
pub mod engine;
pub mod error;
pub mod expiry;
pub mod retention;
pub mod settings;
pub mod validation;

pub use config::{ConfigError, LogFormat, OnAirConfig, StorageBackend};
pub use engine::{ControlOutcome, StartOutcome, TimerEngine};
pub use error::EngineError;
pub use settings::SettingsUpdate;
pub use validation::ValidationError;
