//! The authoritative timer/queue engine.
//!
//! One [`TimerEngine`] owns the single "now playing" slot. Every mutating
//! operation runs under one async mutex, so the read-decide-write sequence
//! against the store is never interleaved with another operation. The same
//! mutex guards the last emitted event timestamp, which keeps event
//! timestamps non-decreasing.
//!
//! # Completion pipeline
//!
//! ```text
//! finished timer
//!     |
//!     +-- was a transition? --> TRANSITION_COMPLETE, dequeue next
//!     |
//!     +-- TIMER_COMPLETE / TIMER_SKIP
//!         |
//!         +-- transition delay > 0 and queue non-empty --> TRANSITION_START
//!         +-- otherwise --> dequeue next (QUEUE_REMOVE, TIMER_START) or idle
//! ```

use chrono::{DateTime, Utc};
use onair_store::Store;
use onair_types::{
    Clock, ControlAction, Event, EventKind, QueueItem, QueueItemId, QueueRemovePayload,
    ResetAllPayload, Settings, StateSnapshot, Timer, TimerEndPayload, TimerId, TimerPausePayload,
    TimerResumePayload, TimerStartPayload, TimerStatus, TransitionCompletePayload,
    TransitionStartPayload, millis_between, shift_millis,
};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, broadcast, watch};

use crate::error::EngineError;
use crate::settings::{self, SettingsUpdate};
use crate::validation::{ValidationError, validate_duration, validate_name};

/// Capacity of the event notification channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Result of [`TimerEngine::start_or_queue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// The timer became active immediately.
    Started(Timer),
    /// The timer was appended to the queue.
    Queued(QueueItem),
}

/// Result of a control operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    /// State changed.
    Applied,
    /// Nothing to do: no active timer, wrong pause state, or a stale id.
    Ignored,
}

/// How an active timer left the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finish {
    Complete,
    Skip,
}

/// The authoritative engine. Share it behind an `Arc`.
#[derive(Debug)]
pub struct TimerEngine {
    store: Store,
    clock: Clock,
    events: broadcast::Sender<Event>,
    revision: watch::Sender<u64>,
    /// Serializes mutations; holds the last emitted event timestamp.
    slot: Mutex<DateTime<Utc>>,
}

impl TimerEngine {
    /// Build an engine over `store`, reading time from `clock`.
    pub fn new(store: Store, clock: Clock) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (revision, _) = watch::channel(0);
        Self {
            store,
            clock,
            events,
            revision,
            slot: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    /// The underlying store.
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// The engine's clock.
    pub const fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Receive every event after it is appended to the log.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Observe a counter bumped after every committed mutation, whether or
    /// not its event reached the log.
    pub fn watch_revision(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current timer, queue, and server time.
    pub async fn state(&self) -> Result<StateSnapshot, EngineError> {
        let current_timer = self.store.active_timer().await?;
        let queue = self.store.queue_items().await?;
        Ok(StateSnapshot {
            current_timer,
            queue,
            server_time: self.clock.now(),
        })
    }

    /// Current settings.
    pub async fn settings(&self) -> Result<Settings, EngineError> {
        Ok(self.store.settings().await?)
    }

    /// Validate and persist a partial settings update.
    pub async fn update_settings(&self, update: SettingsUpdate) -> Result<Settings, EngineError> {
        settings::apply(&self.store, update).await
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Start a timer now, or queue it behind the active one.
    ///
    /// With `priority`, an active timer is interrupted and its remaining time
    /// re-queued at the front.
    pub async fn start_or_queue(
        &self,
        name: &str,
        duration_seconds: i64,
        priority: bool,
    ) -> Result<StartOutcome, EngineError> {
        validate_name(name)?;
        let duration_seconds = validate_duration(duration_seconds)?;

        let mut last = self.slot.lock().await;
        let now = self.clock.now();
        let active = self.store.active_timer().await?;

        let outcome = match active {
            Some(current) if priority => {
                self.interrupt(current, now, &mut last).await?;
                StartOutcome::Started(self.activate(name, duration_seconds, now, &mut last).await?)
            }
            None => {
                StartOutcome::Started(self.activate(name, duration_seconds, now, &mut last).await?)
            }
            Some(_) => {
                StartOutcome::Queued(self.enqueue_tail(name, duration_seconds, now, &mut last).await?)
            }
        };
        self.bump();

        match &outcome {
            StartOutcome::Started(timer) => {
                tracing::info!(timer_id = %timer.id, timer_name = name, duration_seconds, priority, "Timer started");
            }
            StartOutcome::Queued(item) => {
                tracing::info!(item_id = %item.id, timer_name = name, duration_seconds, position = %item.position, "Timer queued");
            }
        }
        Ok(outcome)
    }

    /// Freeze the active timer.
    pub async fn pause(&self) -> Result<ControlOutcome, EngineError> {
        let mut last = self.slot.lock().await;
        let now = self.clock.now();
        let Some(mut timer) = self.store.active_timer().await? else {
            return Ok(ControlOutcome::Ignored);
        };
        if timer.paused {
            return Ok(ControlOutcome::Ignored);
        }

        timer.paused = true;
        timer.paused_at = Some(now);
        self.store.update_timer(&timer).await?;
        self.emit(
            EventKind::TimerPause(TimerPausePayload {
                timer_id: timer.id,
                paused_at: now,
            }),
            now,
            &mut last,
        )
        .await;
        self.bump();

        tracing::info!(timer_id = %timer.id, "Timer paused");
        Ok(ControlOutcome::Applied)
    }

    /// Unfreeze the active timer, shifting its end by the time spent paused.
    ///
    /// Resuming a `Match` hold completes it instead.
    pub async fn resume(&self) -> Result<ControlOutcome, EngineError> {
        let mut last = self.slot.lock().await;
        let now = self.clock.now();
        let Some(mut timer) = self.store.active_timer().await? else {
            return Ok(ControlOutcome::Ignored);
        };
        if !timer.paused {
            return Ok(ControlOutcome::Ignored);
        }

        if timer.is_match() {
            tracing::info!(timer_id = %timer.id, "Match released");
            self.finish(timer, Finish::Complete, now, &mut last).await?;
            self.bump();
            return Ok(ControlOutcome::Applied);
        }

        let paused_for = timer.paused_at.map_or(0, |at| millis_between(now, at).max(0));
        timer.end_time = shift_millis(timer.end_time, paused_for);
        timer.paused = false;
        timer.paused_at = None;
        self.store.update_timer(&timer).await?;
        self.emit(
            EventKind::TimerResume(TimerResumePayload {
                timer_id: timer.id,
                new_end_time: timer.end_time,
                resumed_at: now,
            }),
            now,
            &mut last,
        )
        .await;
        self.bump();

        tracing::info!(timer_id = %timer.id, paused_for_ms = paused_for, "Timer resumed");
        Ok(ControlOutcome::Applied)
    }

    /// Complete the active timer now, whatever its remaining time.
    pub async fn skip(&self) -> Result<ControlOutcome, EngineError> {
        let mut last = self.slot.lock().await;
        let now = self.clock.now();
        let Some(timer) = self.store.active_timer().await? else {
            return Ok(ControlOutcome::Ignored);
        };

        tracing::info!(timer_id = %timer.id, "Timer skipped");
        self.finish(timer, Finish::Skip, now, &mut last).await?;
        self.bump();
        Ok(ControlOutcome::Applied)
    }

    /// Complete `timer_id` if it is still the active timer.
    ///
    /// Stale or duplicate calls are ignored, so any number of observers may
    /// race to report the same expiry.
    pub async fn complete(&self, timer_id: TimerId) -> Result<ControlOutcome, EngineError> {
        let mut last = self.slot.lock().await;
        let now = self.clock.now();
        let Some(timer) = self.store.active_timer().await? else {
            tracing::debug!(%timer_id, "Complete ignored: no active timer");
            return Ok(ControlOutcome::Ignored);
        };
        if timer.id != timer_id {
            tracing::debug!(%timer_id, active = %timer.id, "Complete ignored: stale timer id");
            return Ok(ControlOutcome::Ignored);
        }

        tracing::info!(%timer_id, "Timer completed");
        self.finish(timer, Finish::Complete, now, &mut last).await?;
        self.bump();
        Ok(ControlOutcome::Applied)
    }

    /// Cancel every active timer and clear the queue. Emits one `RESET_ALL`.
    pub async fn reset_all(&self) -> Result<ControlOutcome, EngineError> {
        let mut last = self.slot.lock().await;
        let now = self.clock.now();

        let active = self.store.active_timers().await?;
        let cancelled = active.len();
        for mut timer in active {
            timer.status = TimerStatus::Cancelled;
            timer.completed_at = Some(now);
            self.store.update_timer(&timer).await?;
        }
        let cleared = self.store.clear_queue().await?;

        self.emit(
            EventKind::ResetAll(ResetAllPayload { reset_at: now }),
            now,
            &mut last,
        )
        .await;
        self.bump();

        tracing::info!(cancelled, cleared, "Reset all timers and queue");
        Ok(ControlOutcome::Applied)
    }

    /// Dispatch an operator control action.
    pub async fn control(
        &self,
        action: ControlAction,
        timer_id: Option<TimerId>,
    ) -> Result<ControlOutcome, EngineError> {
        match action {
            ControlAction::Pause => self.pause().await,
            ControlAction::Resume => self.resume().await,
            ControlAction::Skip => self.skip().await,
            ControlAction::Reset => self.reset_all().await,
            ControlAction::Complete => {
                let id = timer_id.ok_or(ValidationError::MissingTimerId)?;
                self.complete(id).await
            }
        }
    }

    /// Complete the active timer if it has run out. Used by the expiry
    /// watcher; paused timers never expire.
    pub async fn complete_if_expired(&self) -> Result<ControlOutcome, EngineError> {
        let now = self.clock.now();
        match self.store.active_timer().await? {
            Some(timer) if !timer.paused && timer.remaining_ms(now) == 0 => {
                self.complete(timer.id).await
            }
            _ => Ok(ControlOutcome::Ignored),
        }
    }

    // =========================================================================
    // Internals (caller holds the slot lock)
    // =========================================================================

    async fn activate(
        &self,
        name: &str,
        duration_seconds: u32,
        now: DateTime<Utc>,
        last: &mut DateTime<Utc>,
    ) -> Result<Timer, EngineError> {
        let timer = Timer::start(name, duration_seconds, now);
        self.store.insert_timer(&timer).await?;
        self.emit(
            EventKind::TimerStart(TimerStartPayload::from(&timer)),
            now,
            last,
        )
        .await;
        Ok(timer)
    }

    async fn enqueue_tail(
        &self,
        name: &str,
        duration_seconds: u32,
        now: DateTime<Utc>,
        last: &mut DateTime<Utc>,
    ) -> Result<QueueItem, EngineError> {
        let position = self
            .store
            .queue_tail_position()
            .await?
            .map_or(Decimal::ONE, |max| max.saturating_add(Decimal::ONE));
        let item = QueueItem {
            id: QueueItemId::new(),
            name: name.to_owned(),
            duration_seconds,
            position,
            queued_at: now,
        };
        self.store.insert_queue_item(&item).await?;
        self.emit(EventKind::QueueAdd(item.clone()), now, last).await;
        Ok(item)
    }

    /// Mark `current` interrupted and put its remainder at the queue front.
    ///
    /// The remainder sorts before every existing item, including earlier
    /// remainders (see [`remainder_position`]). A transition gap-filler is
    /// dropped instead of re-queued.
    async fn interrupt(
        &self,
        mut current: Timer,
        now: DateTime<Utc>,
        last: &mut DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let remaining = current.remaining_seconds_ceil(now);
        let position = if current.is_transition() {
            None
        } else {
            let head = self.store.queue_head().await?;
            Some(remainder_position(head.map(|item| item.position)))
        };

        current.status = TimerStatus::Interrupted;
        current.completed_at = Some(now);
        self.store.update_timer(&current).await?;

        let Some(position) = position else {
            self.emit(
                EventKind::TransitionComplete(TransitionCompletePayload {
                    timer_id: current.id,
                    completed_at: now,
                }),
                now,
                last,
            )
            .await;
            tracing::info!(timer_id = %current.id, "Transition interrupted");
            return Ok(());
        };

        let item = QueueItem {
            id: QueueItemId::new(),
            name: current.name.clone(),
            duration_seconds: remaining,
            position,
            queued_at: now,
        };
        self.store.insert_queue_item(&item).await?;
        self.emit(EventKind::QueueAdd(item), now, last).await;

        tracing::info!(
            timer_id = %current.id,
            remaining_seconds = remaining,
            position = %position,
            "Timer interrupted and re-queued"
        );
        Ok(())
    }

    /// Take `timer` out of the slot and run the completion pipeline.
    async fn finish(
        &self,
        mut timer: Timer,
        how: Finish,
        now: DateTime<Utc>,
        last: &mut DateTime<Utc>,
    ) -> Result<(), EngineError> {
        timer.status = TimerStatus::Completed;
        timer.completed_at = Some(now);
        self.store.update_timer(&timer).await?;

        if timer.is_transition() {
            self.emit(
                EventKind::TransitionComplete(TransitionCompletePayload {
                    timer_id: timer.id,
                    completed_at: now,
                }),
                now,
                last,
            )
            .await;
            self.dequeue_next(now, last).await?;
            return Ok(());
        }

        let ended = TimerEndPayload {
            timer_id: timer.id,
            at: now,
        };
        let kind = match how {
            Finish::Complete => EventKind::TimerComplete(ended),
            Finish::Skip => EventKind::TimerSkip(ended),
        };
        self.emit(kind, now, last).await;

        let delay = self.transition_delay().await;
        if delay > 0 && self.store.queue_head().await?.is_some() {
            self.start_transition(delay, now, last).await?;
        } else {
            self.dequeue_next(now, last).await?;
        }
        Ok(())
    }

    async fn start_transition(
        &self,
        delay: u32,
        now: DateTime<Utc>,
        last: &mut DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let timer = Timer::transition(delay, now);
        self.store.insert_timer(&timer).await?;
        self.emit(
            EventKind::TransitionStart(TransitionStartPayload {
                timer_id: timer.id,
                duration_seconds: delay,
                start_time: timer.start_time,
                end_time: timer.end_time,
            }),
            now,
            last,
        )
        .await;
        tracing::info!(timer_id = %timer.id, delay, "Transition started");
        Ok(())
    }

    /// Move the queue head into the slot. Leaves the slot empty when the
    /// queue is empty.
    async fn dequeue_next(
        &self,
        now: DateTime<Utc>,
        last: &mut DateTime<Utc>,
    ) -> Result<Option<Timer>, EngineError> {
        let Some(head) = self.store.queue_head().await? else {
            tracing::debug!("Queue empty, slot idle");
            return Ok(None);
        };
        self.store.delete_queue_item(head.id).await?;
        self.emit(
            EventKind::QueueRemove(QueueRemovePayload { item_id: head.id }),
            now,
            last,
        )
        .await;
        let timer = self
            .activate(&head.name, head.duration_seconds, now, last)
            .await?;
        tracing::info!(timer_id = %timer.id, timer_name = %timer.name, "Dequeued next timer");
        Ok(Some(timer))
    }

    /// Transition delay from settings; a failed read counts as zero.
    async fn transition_delay(&self) -> u32 {
        match self.store.settings().await {
            Ok(settings) => settings.transition_delay_seconds,
            Err(e) => {
                tracing::warn!(error = %e, "Settings read failed, using no transition delay");
                0
            }
        }
    }

    /// Append an event and notify subscribers. Log failures are swallowed:
    /// the timer and queue records are the authority, not the log.
    async fn emit(&self, kind: EventKind, now: DateTime<Utc>, last: &mut DateTime<Utc>) {
        let timestamp = now.max(*last);
        *last = timestamp;
        let event = Event::new(kind, timestamp);

        match self.store.append_event(&event).await {
            Ok(()) => {
                tracing::debug!(event_id = %event.id, event_type = %event.event_type(), "Event recorded");
                // No receivers is fine.
                let _ = self.events.send(event);
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    event_type = %event.event_type(),
                    "Event log append failed; state change kept"
                );
            }
        }
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r = r.wrapping_add(1));
    }
}

/// Queue position for an interrupted remainder, given the current head.
///
/// An empty queue, or a head at one or above, puts the remainder at 0.5.
/// Between one half and one it halves the head. Once the head is at or
/// below one half, each remainder steps a whole unit lower, so positions
/// never shrink toward the limit of `Decimal` precision.
fn remainder_position(head: Option<Decimal>) -> Decimal {
    let half = Decimal::new(5, 1);
    match head {
        None => half,
        Some(head) if head > half => head
            .checked_div(Decimal::TWO)
            .map_or(half, |p| p.min(half)),
        Some(head) => head.saturating_sub(Decimal::ONE),
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn remainder_goes_to_one_half_ahead_of_ordinary_items() {
        assert_eq!(remainder_position(None), Decimal::new(5, 1));
        assert_eq!(remainder_position(Some(Decimal::ONE)), Decimal::new(5, 1));
        assert_eq!(remainder_position(Some(Decimal::from(7))), Decimal::new(5, 1));
        assert_eq!(remainder_position(Some(Decimal::new(75, 2))), Decimal::new(375, 3));
    }

    #[test]
    fn nested_remainders_step_down_by_whole_units() {
        let mut head = remainder_position(None);
        for _ in 0..500 {
            let next = remainder_position(Some(head));
            assert!(next < head);
            assert_eq!(head - next, Decimal::ONE);
            head = next;
        }
        assert_eq!(head, Decimal::new(-4995, 1));
    }
}
