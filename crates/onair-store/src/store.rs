//! Backend-agnostic store handle.
//!
//! The engine, replicas, and HTTP layer all talk to a [`Store`], which
//! dispatches to either the in-memory backend or the durable
//! `PostgreSQL` + `Dragonfly` pair. Enum dispatch keeps the async methods
//! free of boxed futures.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use onair_types::{Event, EventId, QueueItem, QueueItemId, Settings, Timer};
use rust_decimal::Decimal;

use crate::dragonfly::DragonflyPool;
use crate::error::StoreError;
use crate::event_store::EventStore;
use crate::memory::MemoryStore;
use crate::postgres::PostgresPool;
use crate::timer_store::TimerStore;

/// Durable backend: documents and events in `PostgreSQL`, settings in
/// `Dragonfly`.
#[derive(Clone)]
pub struct DurableStore {
    /// Timers, queue, event log.
    pub postgres: PostgresPool,
    /// Settings keys.
    pub dragonfly: DragonflyPool,
}

/// Handle to whichever backend the process was configured with.
#[derive(Clone)]
pub enum Store {
    /// Process-local tables.
    Memory(Arc<MemoryStore>),
    /// `PostgreSQL` + `Dragonfly`.
    Durable(DurableStore),
}

impl Store {
    /// A fresh in-memory store.
    pub fn memory() -> Self {
        Self::Memory(Arc::new(MemoryStore::new()))
    }

    /// A durable store over already-connected pools.
    pub const fn durable(postgres: PostgresPool, dragonfly: DragonflyPool) -> Self {
        Self::Durable(DurableStore {
            postgres,
            dragonfly,
        })
    }

    /// Connect the durable pair: `PostgreSQL` (migrated) and `Dragonfly`.
    pub async fn open_durable(
        postgres_url: &str,
        dragonfly_url: &str,
        max_connections: u32,
    ) -> Result<Self, StoreError> {
        let postgres = PostgresPool::open(postgres_url, max_connections).await?;
        let dragonfly = DragonflyPool::connect(dragonfly_url).await?;
        Ok(Self::durable(postgres, dragonfly))
    }

    /// Short backend name for logs.
    pub const fn backend_name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Durable(_) => "durable",
        }
    }

    // =========================================================================
    // Timers
    // =========================================================================

    /// The active timer, if any.
    pub async fn active_timer(&self) -> Result<Option<Timer>, StoreError> {
        match self {
            Self::Memory(m) => m.active_timer().await,
            Self::Durable(d) => TimerStore::new(d.postgres.pool()).active_timer().await,
        }
    }

    /// Every timer with status `active`. Normally zero or one.
    pub async fn active_timers(&self) -> Result<Vec<Timer>, StoreError> {
        match self {
            Self::Memory(m) => m.active_timers().await,
            Self::Durable(d) => TimerStore::new(d.postgres.pool()).active_timers().await,
        }
    }

    /// Insert a new timer.
    pub async fn insert_timer(&self, timer: &Timer) -> Result<(), StoreError> {
        match self {
            Self::Memory(m) => m.insert_timer(timer).await,
            Self::Durable(d) => TimerStore::new(d.postgres.pool()).insert_timer(timer).await,
        }
    }

    /// Overwrite an existing timer.
    pub async fn update_timer(&self, timer: &Timer) -> Result<(), StoreError> {
        match self {
            Self::Memory(m) => m.update_timer(timer).await,
            Self::Durable(d) => TimerStore::new(d.postgres.pool()).update_timer(timer).await,
        }
    }

    // =========================================================================
    // Queue
    // =========================================================================

    /// All queue items, smallest position first.
    pub async fn queue_items(&self) -> Result<Vec<QueueItem>, StoreError> {
        match self {
            Self::Memory(m) => m.queue_items().await,
            Self::Durable(d) => TimerStore::new(d.postgres.pool()).queue_items().await,
        }
    }

    /// The next item to be served.
    pub async fn queue_head(&self) -> Result<Option<QueueItem>, StoreError> {
        match self {
            Self::Memory(m) => m.queue_head().await,
            Self::Durable(d) => TimerStore::new(d.postgres.pool()).queue_head().await,
        }
    }

    /// The largest position currently in the queue.
    pub async fn queue_tail_position(&self) -> Result<Option<Decimal>, StoreError> {
        match self {
            Self::Memory(m) => m.queue_tail_position().await,
            Self::Durable(d) => TimerStore::new(d.postgres.pool()).queue_tail_position().await,
        }
    }

    /// Insert a queue item.
    pub async fn insert_queue_item(&self, item: &QueueItem) -> Result<(), StoreError> {
        match self {
            Self::Memory(m) => m.insert_queue_item(item).await,
            Self::Durable(d) => TimerStore::new(d.postgres.pool()).insert_queue_item(item).await,
        }
    }

    /// Delete a queue item. Returns whether it existed.
    pub async fn delete_queue_item(&self, id: QueueItemId) -> Result<bool, StoreError> {
        match self {
            Self::Memory(m) => m.delete_queue_item(id).await,
            Self::Durable(d) => TimerStore::new(d.postgres.pool()).delete_queue_item(id).await,
        }
    }

    /// Delete every queue item. Returns the number removed.
    pub async fn clear_queue(&self) -> Result<u64, StoreError> {
        match self {
            Self::Memory(m) => m.clear_queue().await,
            Self::Durable(d) => TimerStore::new(d.postgres.pool()).clear_queue().await,
        }
    }

    // =========================================================================
    // Event log
    // =========================================================================

    /// Append an event to the log.
    pub async fn append_event(&self, event: &Event) -> Result<(), StoreError> {
        match self {
            Self::Memory(m) => m.append_event(event).await,
            Self::Durable(d) => EventStore::new(d.postgres.pool()).append(event).await,
        }
    }

    /// Events with `timestamp >= since` in replay order, at most `limit`.
    pub async fn events_since(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Event>, StoreError> {
        match self {
            Self::Memory(m) => m.events_since(since, limit).await,
            Self::Durable(d) => EventStore::new(d.postgres.pool()).since(since, limit).await,
        }
    }

    /// Events strictly after `(since, after)` in replay order, at most
    /// `limit`. Pages through runs of events sharing one timestamp.
    pub async fn events_after(
        &self,
        since: DateTime<Utc>,
        after: EventId,
        limit: u32,
    ) -> Result<Vec<Event>, StoreError> {
        match self {
            Self::Memory(m) => m.events_after(since, after, limit).await,
            Self::Durable(d) => {
                EventStore::new(d.postgres.pool())
                    .after(since, after, limit)
                    .await
            }
        }
    }

    /// Retention cleanup: delete events with `timestamp < before`.
    pub async fn delete_events_before(&self, before: DateTime<Utc>) -> Result<u64, StoreError> {
        match self {
            Self::Memory(m) => m.delete_events_before(before).await,
            Self::Durable(d) => EventStore::new(d.postgres.pool()).delete_before(before).await,
        }
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Read both settings.
    pub async fn settings(&self) -> Result<Settings, StoreError> {
        match self {
            Self::Memory(m) => m.settings().await,
            Self::Durable(d) => d.dragonfly.settings().await,
        }
    }

    /// Store the transition delay. Bounds are checked by the caller.
    pub async fn set_transition_delay(&self, seconds: u32) -> Result<(), StoreError> {
        match self {
            Self::Memory(m) => m.set_transition_delay(seconds).await,
            Self::Durable(d) => d.dragonfly.set_transition_delay(seconds).await,
        }
    }

    /// Store the broadcast delay. Bounds are checked by the caller.
    pub async fn set_broadcast_delay(&self, seconds: u32) -> Result<(), StoreError> {
        match self {
            Self::Memory(m) => m.set_broadcast_delay(seconds).await,
            Self::Durable(d) => d.dragonfly.set_broadcast_delay(seconds).await,
        }
    }

    /// Release backend connections.
    pub async fn close(&self) {
        if let Self::Durable(d) = self {
            d.postgres.close().await;
            d.dragonfly.close().await;
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Store").field(&self.backend_name()).finish()
    }
}
