//! In-memory store for tests and single-node development.
//!
//! Mirrors the `PostgreSQL` + `Dragonfly` contract table for table. Each
//! table can be switched into a failing mode so callers can exercise their
//! error paths without a real outage.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use onair_types::{Event, EventId, QueueItem, QueueItemId, Settings, Timer};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::error::StoreError;

/// Which part of the in-memory store to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Timers and queue items.
    Documents,
    /// The event log.
    EventLog,
    /// The settings keys.
    Settings,
}

/// Process-local store backed by `tokio` read/write locks.
#[derive(Debug, Default)]
pub struct MemoryStore {
    timers: RwLock<Vec<Timer>>,
    queue: RwLock<Vec<QueueItem>>,
    events: RwLock<Vec<Event>>,
    settings: RwLock<Settings>,
    fail_documents: AtomicBool,
    fail_event_log: AtomicBool,
    fail_settings: AtomicBool,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation on `fault` fail (or succeed again).
    pub fn set_failing(&self, fault: Fault, failing: bool) {
        self.flag(fault).store(failing, Ordering::SeqCst);
    }

    /// Every timer ever inserted, in insertion order.
    pub async fn all_timers(&self) -> Vec<Timer> {
        self.timers.read().await.clone()
    }

    /// Every event in the log, in append order.
    pub async fn all_events(&self) -> Vec<Event> {
        self.events.read().await.clone()
    }

    const fn flag(&self, fault: Fault) -> &AtomicBool {
        match fault {
            Fault::Documents => &self.fail_documents,
            Fault::EventLog => &self.fail_event_log,
            Fault::Settings => &self.fail_settings,
        }
    }

    fn check(&self, fault: Fault) -> Result<(), StoreError> {
        if self.flag(fault).load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{fault:?} store failing")));
        }
        Ok(())
    }

    // =========================================================================
    // Timers
    // =========================================================================

    /// The active timer, if any.
    pub async fn active_timer(&self) -> Result<Option<Timer>, StoreError> {
        self.check(Fault::Documents)?;
        let timers = self.timers.read().await;
        Ok(timers
            .iter()
            .filter(|t| t.is_active())
            .max_by_key(|t| t.start_time)
            .cloned())
    }

    /// Every timer with status `active`.
    pub async fn active_timers(&self) -> Result<Vec<Timer>, StoreError> {
        self.check(Fault::Documents)?;
        let timers = self.timers.read().await;
        Ok(timers.iter().filter(|t| t.is_active()).cloned().collect())
    }

    /// Insert a new timer.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] when inserting a second active timer,
    /// matching the unique index on the durable backend.
    pub async fn insert_timer(&self, timer: &Timer) -> Result<(), StoreError> {
        self.check(Fault::Documents)?;
        let mut timers = self.timers.write().await;
        if timer.is_active() && timers.iter().any(Timer::is_active) {
            return Err(StoreError::Corrupt {
                table: "timers",
                reason: "a timer is already active".to_owned(),
            });
        }
        timers.push(timer.clone());
        Ok(())
    }

    /// Overwrite an existing timer.
    pub async fn update_timer(&self, timer: &Timer) -> Result<(), StoreError> {
        self.check(Fault::Documents)?;
        let mut timers = self.timers.write().await;
        let slot = timers
            .iter_mut()
            .find(|t| t.id == timer.id)
            .ok_or_else(|| StoreError::NotFound(format!("timer {}", timer.id)))?;
        *slot = timer.clone();
        Ok(())
    }

    // =========================================================================
    // Queue
    // =========================================================================

    /// All queue items, smallest position first.
    pub async fn queue_items(&self) -> Result<Vec<QueueItem>, StoreError> {
        self.check(Fault::Documents)?;
        let mut items = self.queue.read().await.clone();
        items.sort_by(|a, b| a.position.cmp(&b.position));
        Ok(items)
    }

    /// The next item to be served.
    pub async fn queue_head(&self) -> Result<Option<QueueItem>, StoreError> {
        self.check(Fault::Documents)?;
        let queue = self.queue.read().await;
        Ok(queue.iter().min_by_key(|i| i.position).cloned())
    }

    /// The largest position currently in the queue.
    pub async fn queue_tail_position(&self) -> Result<Option<Decimal>, StoreError> {
        self.check(Fault::Documents)?;
        let queue = self.queue.read().await;
        Ok(queue.iter().map(|i| i.position).max())
    }

    /// Insert a queue item.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] on a duplicate position, matching the
    /// unique constraint on the durable backend.
    pub async fn insert_queue_item(&self, item: &QueueItem) -> Result<(), StoreError> {
        self.check(Fault::Documents)?;
        let mut queue = self.queue.write().await;
        if queue.iter().any(|i| i.position == item.position) {
            return Err(StoreError::Corrupt {
                table: "queue_items",
                reason: format!("duplicate position {}", item.position),
            });
        }
        queue.push(item.clone());
        Ok(())
    }

    /// Delete a queue item. Returns whether it existed.
    pub async fn delete_queue_item(&self, id: QueueItemId) -> Result<bool, StoreError> {
        self.check(Fault::Documents)?;
        let mut queue = self.queue.write().await;
        let before = queue.len();
        queue.retain(|i| i.id != id);
        Ok(queue.len() != before)
    }

    /// Delete every queue item. Returns the number removed.
    pub async fn clear_queue(&self) -> Result<u64, StoreError> {
        self.check(Fault::Documents)?;
        let mut queue = self.queue.write().await;
        let removed = u64::try_from(queue.len()).unwrap_or(u64::MAX);
        queue.clear();
        Ok(removed)
    }

    // =========================================================================
    // Event log
    // =========================================================================

    /// Append an event.
    pub async fn append_event(&self, event: &Event) -> Result<(), StoreError> {
        self.check(Fault::EventLog)?;
        self.events.write().await.push(event.clone());
        Ok(())
    }

    /// Events with `timestamp >= since`, oldest first, at most `limit`.
    pub async fn events_since(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Event>, StoreError> {
        self.check(Fault::EventLog)?;
        let events = self.events.read().await;
        let mut matched: Vec<Event> = events
            .iter()
            .filter(|e| e.timestamp >= since)
            .cloned()
            .collect();
        matched.sort_by_key(Event::order_key);
        matched.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(matched)
    }

    /// Events strictly after `(since, after)` in replay order, at most `limit`.
    pub async fn events_after(
        &self,
        since: DateTime<Utc>,
        after: EventId,
        limit: u32,
    ) -> Result<Vec<Event>, StoreError> {
        self.check(Fault::EventLog)?;
        let events = self.events.read().await;
        let mut matched: Vec<Event> = events
            .iter()
            .filter(|e| e.order_key() > (since, after))
            .cloned()
            .collect();
        matched.sort_by_key(Event::order_key);
        matched.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(matched)
    }

    /// Delete events with `timestamp < before`. Returns the count.
    pub async fn delete_events_before(&self, before: DateTime<Utc>) -> Result<u64, StoreError> {
        self.check(Fault::EventLog)?;
        let mut events = self.events.write().await;
        let count = events.len();
        events.retain(|e| e.timestamp >= before);
        Ok(u64::try_from(count.saturating_sub(events.len())).unwrap_or(0))
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Read both settings.
    pub async fn settings(&self) -> Result<Settings, StoreError> {
        self.check(Fault::Settings)?;
        Ok(*self.settings.read().await)
    }

    /// Store the transition delay.
    pub async fn set_transition_delay(&self, seconds: u32) -> Result<(), StoreError> {
        self.check(Fault::Settings)?;
        self.settings.write().await.transition_delay_seconds = seconds;
        Ok(())
    }

    /// Store the broadcast delay.
    pub async fn set_broadcast_delay(&self, seconds: u32) -> Result<(), StoreError> {
        self.check(Fault::Settings)?;
        self.settings.write().await.broadcast_delay_seconds = seconds;
        Ok(())
    }
}
