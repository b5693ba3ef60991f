//! Event buffer and maturation for one delayed replica.
//!
//! A [`Reconstructor`] accepts events in any order and from any number of
//! overlapping sources, and applies each one exactly once, in
//! `(timestamp, id)` order, no earlier than `delay` after it happened.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use onair_types::{Event, EventId, ReplicaState, seconds_before};

use crate::fold::fold;

/// How long applied ids are remembered after they mature.
const APPLIED_MEMORY_SECONDS: u64 = 600;

/// Replica state plus the pending and applied bookkeeping behind it.
#[derive(Debug, Clone, Default)]
pub struct Reconstructor {
    delay_seconds: u32,
    state: ReplicaState,
    pending: Vec<Event>,
    pending_ids: HashSet<EventId>,
    /// Applied ids with their timestamps, pruned below `floor`.
    applied: HashMap<EventId, DateTime<Utc>>,
    /// Events older than this are treated as already applied.
    floor: Option<DateTime<Utc>>,
    applied_total: u64,
    cursor: Option<DateTime<Utc>>,
}

impl Reconstructor {
    /// An empty replica lagging `delay_seconds` behind the log.
    pub fn new(delay_seconds: u32) -> Self {
        Self {
            delay_seconds,
            ..Self::default()
        }
    }

    /// Current lag.
    pub const fn delay_seconds(&self) -> u32 {
        self.delay_seconds
    }

    /// Change the lag. Already-applied events stay applied.
    pub const fn set_delay(&mut self, delay_seconds: u32) {
        self.delay_seconds = delay_seconds;
    }

    /// The replayed state.
    pub const fn state(&self) -> &ReplicaState {
        &self.state
    }

    /// Number of events applied since creation.
    pub const fn applied_count(&self) -> u64 {
        self.applied_total
    }

    /// Number of events waiting to mature.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Newest event timestamp seen from any source.
    pub const fn cursor(&self) -> Option<DateTime<Utc>> {
        self.cursor
    }

    /// Buffer one event. Returns `false` for a duplicate of a pending or
    /// applied event.
    pub fn ingest(&mut self, event: Event) -> bool {
        if self.floor.is_some_and(|floor| event.timestamp < floor)
            || self.applied.contains_key(&event.id)
            || self.pending_ids.contains(&event.id)
        {
            return false;
        }
        if self.cursor.is_none_or(|c| event.timestamp > c) {
            self.cursor = Some(event.timestamp);
        }
        self.pending_ids.insert(event.id);
        self.pending.push(event);
        true
    }

    /// Apply every pending event with `timestamp <= now - delay`. Returns
    /// how many were applied.
    pub fn mature(&mut self, now: DateTime<Utc>) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        let cutoff = seconds_before(now, u64::from(self.delay_seconds));
        self.pending.sort_by_key(Event::order_key);
        let ready = self.pending.partition_point(|e| e.timestamp <= cutoff);
        if ready == 0 {
            return 0;
        }

        let matured: Vec<Event> = self.pending.drain(..ready).collect();
        let mut applied = 0_usize;
        for event in matured {
            self.pending_ids.remove(&event.id);
            if self.applied.insert(event.id, event.timestamp).is_some() {
                continue;
            }
            self.state = fold(std::mem::take(&mut self.state), &event, now);
            self.applied_total = self.applied_total.saturating_add(1);
            applied = applied.saturating_add(1);
        }
        self.prune_applied(cutoff);
        applied
    }

    fn prune_applied(&mut self, cutoff: DateTime<Utc>) {
        let floor = seconds_before(cutoff, APPLIED_MEMORY_SECONDS);
        if self.floor.is_none_or(|f| floor > f) {
            self.floor = Some(floor);
            self.applied.retain(|_, ts| *ts >= floor);
        }
    }
}
