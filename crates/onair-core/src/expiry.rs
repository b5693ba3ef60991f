//! Authoritative expiry watcher.
//!
//! Dashboards also report expiries through `complete`, but the server does
//! not depend on any dashboard being open: this task polls the active timer
//! and completes it once its countdown reaches zero. Races with dashboard
//! calls are resolved by the idempotent `complete` contract.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::{ControlOutcome, TimerEngine};

/// Spawn the watcher. Abort the handle to stop it.
pub fn spawn_expiry_watcher(engine: Arc<TimerEngine>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval_ms = interval.as_millis(), "Expiry watcher started");

        loop {
            ticker.tick().await;
            match engine.complete_if_expired().await {
                Ok(ControlOutcome::Applied) => {
                    tracing::debug!("Expired timer completed by watcher");
                }
                Ok(ControlOutcome::Ignored) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Expiry check failed");
                }
            }
        }
    })
}
