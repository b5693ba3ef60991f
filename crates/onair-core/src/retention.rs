//! Event log retention.
//!
//! Replicas only ever read back `delay + lookback` worth of history, so
//! older events can be dropped. The sweeper deletes everything older than
//! the configured age on a fixed interval.

use std::time::Duration;

use onair_store::{Store, StoreError};
use onair_types::{Clock, seconds_before};
use tokio::task::JoinHandle;

/// Delete every event older than `max_age_seconds`. Returns the count.
pub async fn sweep_once(
    store: &Store,
    clock: &Clock,
    max_age_seconds: u64,
) -> Result<u64, StoreError> {
    let cutoff = seconds_before(clock.now(), max_age_seconds);
    let deleted = store.delete_events_before(cutoff).await?;
    if deleted > 0 {
        tracing::info!(deleted, %cutoff, "Retention sweep removed old events");
    }
    Ok(deleted)
}

/// Spawn the periodic sweeper. Abort the handle to stop it.
pub fn spawn_retention_sweeper(
    store: Store,
    clock: Clock,
    max_age_seconds: u64,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        tracing::info!(max_age_seconds, "Retention sweeper started");
        loop {
            ticker.tick().await;
            if let Err(e) = sweep_once(&store, &clock, max_age_seconds).await {
                tracing::warn!(error = %e, "Retention sweep failed");
            }
        }
    })
}
