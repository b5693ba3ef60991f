//! `OnAir` server binary.
//!
//! Wires together configuration, logging, the storage backend, the
//! authoritative timer engine, its background tasks, and the HTTP +
//! `WebSocket` API, then serves until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `onair-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Connect the storage backend (and run migrations when durable)
//! 4. Create the timer engine
//! 5. Start the expiry watcher and retention sweeper
//! 6. Serve the API until shutdown
//! 7. Stop background tasks and close the store

mod error;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use onair_core::config::{LoggingConfig, ReplicaConfig, StorageConfig};
use onair_core::expiry::spawn_expiry_watcher;
use onair_core::retention::spawn_retention_sweeper;
use onair_core::{LogFormat, OnAirConfig, StorageBackend, TimerEngine};
use onair_events::{EventSource, HttpEventSource, ReplicaOptions};
use onair_observer::{AppState, ServerConfig};
use onair_store::Store;
use onair_types::Clock;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::ServerError;

/// Configuration file, relative to the working directory.
const CONFIG_PATH: &str = "onair-config.yaml";

/// Per-request timeout when replicating from a remote primary.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step or the API server fails.
#[tokio::main]
async fn main() -> Result<(), ServerError> {
    // 1. Load configuration.
    let config = OnAirConfig::load_or_default(Path::new(CONFIG_PATH))?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!(
        host = config.server.host,
        port = config.server.port,
        backend = ?config.storage.backend,
        "onair-server starting"
    );

    // 3. Storage.
    let store = connect_store(&config.storage).await?;
    info!(backend = store.backend_name(), "Store ready");

    // 4. Engine.
    let clock = Clock::System;
    let engine = Arc::new(TimerEngine::new(store.clone(), clock.clone()));

    // 5. Background tasks.
    let expiry = spawn_expiry_watcher(
        Arc::clone(&engine),
        config.engine.expiry_check_interval(),
    );
    let retention = config.retention.enabled.then(|| {
        spawn_retention_sweeper(
            store.clone(),
            clock.clone(),
            config
                .retention
                .effective_max_age_seconds(config.replica.lookback_seconds),
            config.retention.sweep_interval(),
        )
    });

    // 6. API.
    let mut state =
        AppState::new(Arc::clone(&engine)).with_replica_options(replica_options(&config.replica));
    if let Some(url) = &config.replica.upstream_url {
        info!(upstream = url, "Delayed views replicate from remote primary");
        state = state.with_event_source(EventSource::Http(HttpEventSource::new(
            url.clone(),
            UPSTREAM_TIMEOUT,
        )?));
    }
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    let served =
        onair_observer::start_server(&server_config, Arc::new(state), shutdown_signal()).await;

    // 7. Shutdown.
    expiry.abort();
    if let Some(handle) = retention {
        handle.abort();
    }
    store.close().await;
    served?;

    info!("onair-server shutdown complete");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Connect the configured backend.
async fn connect_store(storage: &StorageConfig) -> Result<Store, ServerError> {
    match storage.backend {
        StorageBackend::Memory => {
            warn!("Using the in-memory store, state is lost on restart");
            Ok(Store::memory())
        }
        StorageBackend::Durable => {
            let store = Store::open_durable(
                &storage.postgres_url,
                &storage.dragonfly_url,
                storage.max_connections,
            )
            .await?;
            Ok(store)
        }
    }
}

fn replica_options(replica: &ReplicaConfig) -> ReplicaOptions {
    ReplicaOptions {
        maturation_interval: replica.maturation_interval(),
        refresh_interval: replica.refresh_interval(),
        lookback_seconds: replica.lookback_seconds,
        fetch_limit: replica.fetch_limit,
        ..ReplicaOptions::new(0)
    }
}

/// Resolve on `Ctrl-C`. Never resolves if the handler cannot be installed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
