//! Timer and queue persistence in `PostgreSQL`.
//!
//! The `timers` table keeps every timer ever started; a partial unique index
//! guarantees at most one row with status `active`. The `queue_items` table
//! holds pending countdowns keyed by a unique `NUMERIC` position.

use chrono::{DateTime, Utc};
use onair_types::{QueueItem, QueueItemId, Timer, TimerId};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;

const TIMER_COLUMNS: &str =
    "id, name, duration_seconds, start_time, end_time, status, paused, paused_at, completed_at";

const QUEUE_COLUMNS: &str = "id, name, duration_seconds, position, queued_at";

/// Operations on the `timers` and `queue_items` tables.
pub struct TimerStore<'a> {
    pool: &'a PgPool,
}

impl<'a> TimerStore<'a> {
    /// Create a new timer store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Timers
    // =========================================================================

    /// The active timer, if any.
    pub async fn active_timer(&self) -> Result<Option<Timer>, StoreError> {
        let row = sqlx::query_as::<_, TimerRow>(&format!(
            "SELECT {TIMER_COLUMNS} FROM timers WHERE status = 'active' \
             ORDER BY start_time DESC LIMIT 1"
        ))
        .fetch_optional(self.pool)
        .await?;

        row.map(Timer::try_from).transpose()
    }

    /// Every timer with status `active`.
    pub async fn active_timers(&self) -> Result<Vec<Timer>, StoreError> {
        let rows = sqlx::query_as::<_, TimerRow>(&format!(
            "SELECT {TIMER_COLUMNS} FROM timers WHERE status = 'active' ORDER BY start_time"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Timer::try_from).collect()
    }

    /// Insert a new timer row.
    pub async fn insert_timer(&self, timer: &Timer) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO timers (id, name, duration_seconds, start_time, end_time, status, paused, paused_at, completed_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(timer.id.into_inner())
        .bind(&timer.name)
        .bind(to_db_seconds(timer.duration_seconds))
        .bind(timer.start_time)
        .bind(timer.end_time)
        .bind(timer.status.as_str())
        .bind(timer.paused)
        .bind(timer.paused_at)
        .bind(timer.completed_at)
        .execute(self.pool)
        .await?;

        tracing::debug!(timer_id = %timer.id, timer_name = %timer.name, "Inserted timer");
        Ok(())
    }

    /// Overwrite the mutable fields of an existing timer.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no row has the timer's id.
    pub async fn update_timer(&self, timer: &Timer) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"UPDATE timers
              SET end_time = $2, status = $3, paused = $4, paused_at = $5, completed_at = $6
              WHERE id = $1",
        )
        .bind(timer.id.into_inner())
        .bind(timer.end_time)
        .bind(timer.status.as_str())
        .bind(timer.paused)
        .bind(timer.paused_at)
        .bind(timer.completed_at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("timer {}", timer.id)));
        }
        Ok(())
    }

    // =========================================================================
    // Queue
    // =========================================================================

    /// All queue items, smallest position first.
    pub async fn queue_items(&self) -> Result<Vec<QueueItem>, StoreError> {
        let rows = sqlx::query_as::<_, QueueItemRow>(&format!(
            "SELECT {QUEUE_COLUMNS} FROM queue_items ORDER BY position"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(QueueItem::try_from).collect()
    }

    /// The next item to be served.
    pub async fn queue_head(&self) -> Result<Option<QueueItem>, StoreError> {
        let row = sqlx::query_as::<_, QueueItemRow>(&format!(
            "SELECT {QUEUE_COLUMNS} FROM queue_items ORDER BY position LIMIT 1"
        ))
        .fetch_optional(self.pool)
        .await?;

        row.map(QueueItem::try_from).transpose()
    }

    /// The largest position currently in the queue.
    pub async fn queue_tail_position(&self) -> Result<Option<Decimal>, StoreError> {
        let max = sqlx::query_scalar::<_, Option<Decimal>>("SELECT MAX(position) FROM queue_items")
            .fetch_one(self.pool)
            .await?;
        Ok(max)
    }

    /// Insert a queue item.
    pub async fn insert_queue_item(&self, item: &QueueItem) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO queue_items (id, name, duration_seconds, position, queued_at)
              VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(item.id.into_inner())
        .bind(&item.name)
        .bind(to_db_seconds(item.duration_seconds))
        .bind(item.position)
        .bind(item.queued_at)
        .execute(self.pool)
        .await?;

        tracing::debug!(item_id = %item.id, position = %item.position, "Inserted queue item");
        Ok(())
    }

    /// Delete a queue item. Returns whether a row was removed.
    pub async fn delete_queue_item(&self, id: QueueItemId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM queue_items WHERE id = $1")
            .bind(id.into_inner())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every queue item. Returns the number removed.
    pub async fn clear_queue(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM queue_items")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// A row from the `timers` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TimerRow {
    /// Timer id.
    pub id: Uuid,
    /// Display label.
    pub name: String,
    /// Countdown length in seconds.
    pub duration_seconds: i32,
    /// Start instant.
    pub start_time: DateTime<Utc>,
    /// End instant.
    pub end_time: DateTime<Utc>,
    /// Status text.
    pub status: String,
    /// Whether frozen.
    pub paused: bool,
    /// Pause instant.
    pub paused_at: Option<DateTime<Utc>>,
    /// Completion instant.
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<TimerRow> for Timer {
    type Error = StoreError;

    fn try_from(row: TimerRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(|e| StoreError::Corrupt {
            table: "timers",
            reason: format!("{e}"),
        })?;
        Ok(Self {
            id: TimerId::from(row.id),
            name: row.name,
            duration_seconds: from_db_seconds("timers", row.duration_seconds)?,
            start_time: row.start_time,
            end_time: row.end_time,
            status,
            paused: row.paused,
            paused_at: row.paused_at,
            completed_at: row.completed_at,
        })
    }
}

/// A row from the `queue_items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QueueItemRow {
    /// Queue item id.
    pub id: Uuid,
    /// Display label.
    pub name: String,
    /// Countdown length in seconds.
    pub duration_seconds: i32,
    /// Ordering key.
    pub position: Decimal,
    /// Enqueue instant.
    pub queued_at: DateTime<Utc>,
}

impl TryFrom<QueueItemRow> for QueueItem {
    type Error = StoreError;

    fn try_from(row: QueueItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: QueueItemId::from(row.id),
            name: row.name,
            duration_seconds: from_db_seconds("queue_items", row.duration_seconds)?,
            position: row.position,
            queued_at: row.queued_at,
        })
    }
}

fn to_db_seconds(seconds: u32) -> i32 {
    i32::try_from(seconds).unwrap_or(i32::MAX)
}

fn from_db_seconds(table: &'static str, seconds: i32) -> Result<u32, StoreError> {
    u32::try_from(seconds).map_err(|e| StoreError::Corrupt {
        table,
        reason: format!("duration {seconds}: {e}"),
    })
}
