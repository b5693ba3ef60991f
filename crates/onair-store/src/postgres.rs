//! `PostgreSQL` half of the durable backend: timers, the queue, and the
//! event log.
//!
//! Opening a pool also brings the schema in `migrations/` up to date, so a
//! [`PostgresPool`] is ready for [`crate::TimerStore`] and
//! [`crate::EventStore`] as soon as it exists.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use crate::error::StoreError;

/// How long an engine operation waits for a free connection.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection pool over the timer, queue, and event tables.
#[derive(Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    /// Connect to `url` with up to `max_connections` connections and apply
    /// pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL cannot be parsed.
    /// Returns [`StoreError::Postgres`] if the connection fails.
    /// Returns [`StoreError::Migration`] if the schema cannot be applied.
    pub async fn open(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options: PgConnectOptions = url
            .parse()
            .map_err(|e: sqlx::Error| StoreError::Config(format!("invalid postgres_url: {e}")))?;
        let max_connections = max_connections.max(1);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!(max_connections, "PostgreSQL ready for timers, queue, and events");
        Ok(Self { pool })
    }

    /// The underlying pool, for the table stores.
    pub(crate) const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close every connection.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL pool closed");
    }
}
