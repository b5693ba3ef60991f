//! Event log operations on the `events` table.
//!
//! Events are appended one at a time as the engine commits each state
//! transition, read back in `(occurred_at, id)` order by delayed replicas,
//! and deleted only by retention cleanup.

use chrono::{DateTime, Utc};
use onair_types::{Event, EventId, EventKind, EventType};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;

/// Operations on the `events` table.
pub struct EventStore<'a> {
    pool: &'a PgPool,
}

impl<'a> EventStore<'a> {
    /// Create a new event store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append a single event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the payload cannot be encoded.
    /// Returns [`StoreError::Postgres`] if the insert fails.
    pub async fn append(&self, event: &Event) -> Result<(), StoreError> {
        let payload = event.kind.payload_json()?;
        sqlx::query(
            r"INSERT INTO events (id, event_type, payload, occurred_at)
              VALUES ($1, $2, $3, $4)",
        )
        .bind(event.id.into_inner())
        .bind(event.event_type().as_str())
        .bind(payload)
        .bind(event.timestamp)
        .execute(self.pool)
        .await?;

        tracing::debug!(event_id = %event.id, event_type = %event.event_type(), "Appended event");
        Ok(())
    }

    /// Events with `occurred_at >= since`, oldest first, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Postgres`] if the query fails.
    /// Returns [`StoreError::Corrupt`] if a stored row cannot be decoded.
    pub async fn since(&self, since: DateTime<Utc>, limit: u32) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r"SELECT id, event_type, payload, occurred_at
              FROM events
              WHERE occurred_at >= $1
              ORDER BY occurred_at, id
              LIMIT $2",
        )
        .bind(since)
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Event::try_from).collect()
    }

    /// Events strictly after the `(since, after)` position in replay
    /// order, at most `limit`. Continues a page that ended on `after`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Postgres`] if the query fails.
    /// Returns [`StoreError::Corrupt`] if a stored row cannot be decoded.
    pub async fn after(
        &self,
        since: DateTime<Utc>,
        after: EventId,
        limit: u32,
    ) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r"SELECT id, event_type, payload, occurred_at
              FROM events
              WHERE (occurred_at, id) > ($1, $2)
              ORDER BY occurred_at, id
              LIMIT $3",
        )
        .bind(since)
        .bind(after.into_inner())
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Event::try_from).collect()
    }

    /// Delete every event with `occurred_at < before`. Returns the count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Postgres`] if the delete fails.
    pub async fn delete_before(&self, before: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM events WHERE occurred_at < $1")
            .bind(before)
            .execute(self.pool)
            .await?;

        tracing::debug!(deleted = result.rows_affected(), %before, "Deleted old events");
        Ok(result.rows_affected())
    }
}

/// A row from the `events` table.
///
/// Uses runtime types rather than compile-time checked types to
/// avoid requiring a live database during builds.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    /// Event id (UUID v7).
    pub id: Uuid,
    /// Event type tag, e.g. `TIMER_START`.
    pub event_type: String,
    /// Type-specific payload.
    pub payload: Option<serde_json::Value>,
    /// Authoritative occurrence time.
    pub occurred_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let event_type: EventType = row.event_type.parse().map_err(|e| StoreError::Corrupt {
            table: "events",
            reason: format!("{e}"),
        })?;
        let kind = EventKind::from_parts(event_type, row.payload)?;
        Ok(Self {
            id: EventId::from(row.id),
            timestamp: row.occurred_at,
            kind,
        })
    }
}
