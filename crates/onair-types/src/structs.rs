//! Core data model: timers, queue items, events, settings, and the
//! snapshots served to clients.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::clock::{millis_between, shift_millis};
use crate::enums::{EventType, TimerStatus};
use crate::ids::{EventId, QueueItemId, TimerId};

/// Reserved name of the internally generated transition gap-filler.
pub const TRANSITION_TIMER_NAME: &str = "transition";

/// Timers with this name are created paused and complete on resume.
pub const MATCH_TIMER_NAME: &str = "Match";

/// Longest countdown an operator may start or queue (two hours).
pub const MAX_TIMER_DURATION_SECONDS: u32 = 7200;

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// The currently running or most recently finished countdown.
///
/// While `paused` is set, `paused_at` is set and `end_time` is frozen: the
/// remaining time is measured against `paused_at` rather than now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Timer {
    /// Unique timer identifier.
    pub id: TimerId,
    /// Display label, e.g. a team or scene name.
    pub name: String,
    /// Original countdown length.
    pub duration_seconds: u32,
    /// When the timer became active.
    pub start_time: DateTime<Utc>,
    /// When the countdown reaches zero. Recomputed on resume.
    pub end_time: DateTime<Utc>,
    /// Lifecycle status.
    pub status: TimerStatus,
    /// Whether the countdown is frozen.
    pub paused: bool,
    /// When the countdown was frozen. Set only while paused.
    pub paused_at: Option<DateTime<Utc>>,
    /// When the timer left the active state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Timer {
    /// Build a new active timer starting at `now`.
    ///
    /// A timer named [`MATCH_TIMER_NAME`] starts paused at `now`.
    pub fn start(name: impl Into<String>, duration_seconds: u32, now: DateTime<Utc>) -> Self {
        let name = name.into();
        let paused = name == MATCH_TIMER_NAME;
        Self {
            id: TimerId::new(),
            end_time: shift_millis(now, i64::from(duration_seconds).saturating_mul(1000)),
            name,
            duration_seconds,
            start_time: now,
            status: TimerStatus::Active,
            paused,
            paused_at: paused.then_some(now),
            completed_at: None,
        }
    }

    /// Build a transition gap-filler timer starting at `now`.
    pub fn transition(duration_seconds: u32, now: DateTime<Utc>) -> Self {
        Self::start(TRANSITION_TIMER_NAME, duration_seconds, now)
    }

    /// Whether this is a transition gap-filler.
    pub fn is_transition(&self) -> bool {
        self.name == TRANSITION_TIMER_NAME
    }

    /// Whether this is a manually gated `Match` timer.
    pub fn is_match(&self) -> bool {
        self.name == MATCH_TIMER_NAME
    }

    /// Whether the timer is the live active timer.
    pub fn is_active(&self) -> bool {
        self.status == TimerStatus::Active
    }

    /// Milliseconds left on the countdown, floored at zero.
    ///
    /// Measured against `paused_at` while paused so the value holds still.
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> i64 {
        let reference = match (self.paused, self.paused_at) {
            (true, Some(at)) => at,
            _ => now,
        };
        millis_between(self.end_time, reference).max(0)
    }

    /// Remaining time rounded up to whole seconds, as re-queued on interrupt.
    pub fn remaining_seconds_ceil(&self, now: DateTime<Utc>) -> u32 {
        let ms = u64::try_from(self.remaining_ms(now)).unwrap_or(0);
        u32::try_from(ms.div_ceil(1000)).unwrap_or(u32::MAX)
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// A pending countdown awaiting its turn.
///
/// The smallest `position` is served next. Positions are exact decimals so
/// repeated front insertions never drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct QueueItem {
    /// Unique queue item identifier.
    pub id: QueueItemId,
    /// Display label.
    pub name: String,
    /// Countdown length once started.
    pub duration_seconds: u32,
    /// Ordering key.
    #[ts(as = "String")]
    pub position: Decimal,
    /// When the item was queued.
    pub queued_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Payload of [`EventKind::TimerStart`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TimerStartPayload {
    /// The timer that became active.
    pub timer_id: TimerId,
    /// Its name.
    pub name: String,
    /// Its duration.
    pub duration_seconds: u32,
    /// Authoritative start time.
    pub start_time: DateTime<Utc>,
    /// Authoritative end time.
    pub end_time: DateTime<Utc>,
    /// Whether it started paused (a `Match` hold).
    pub paused: bool,
    /// Pause instant when started paused.
    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
}

impl From<&Timer> for TimerStartPayload {
    fn from(timer: &Timer) -> Self {
        Self {
            timer_id: timer.id,
            name: timer.name.clone(),
            duration_seconds: timer.duration_seconds,
            start_time: timer.start_time,
            end_time: timer.end_time,
            paused: timer.paused,
            paused_at: timer.paused_at,
        }
    }
}

/// Payload of [`EventKind::TimerPause`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TimerPausePayload {
    /// The paused timer.
    pub timer_id: TimerId,
    /// When it was paused.
    pub paused_at: DateTime<Utc>,
}

/// Payload of [`EventKind::TimerResume`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TimerResumePayload {
    /// The resumed timer.
    pub timer_id: TimerId,
    /// End time after shifting by the pause duration.
    pub new_end_time: DateTime<Utc>,
    /// When it was resumed.
    pub resumed_at: DateTime<Utc>,
}

/// Payload of [`EventKind::TimerComplete`] and [`EventKind::TimerSkip`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TimerEndPayload {
    /// The timer that ended.
    pub timer_id: TimerId,
    /// When it ended.
    pub at: DateTime<Utc>,
}

/// Payload of [`EventKind::QueueRemove`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct QueueRemovePayload {
    /// The removed item.
    pub item_id: QueueItemId,
}

/// Payload of [`EventKind::ResetAll`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ResetAllPayload {
    /// When the reset happened.
    pub reset_at: DateTime<Utc>,
}

/// Payload of [`EventKind::TransitionStart`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TransitionStartPayload {
    /// The gap-filler timer.
    pub timer_id: TimerId,
    /// Gap length.
    pub duration_seconds: u32,
    /// Authoritative start time.
    pub start_time: DateTime<Utc>,
    /// Authoritative end time.
    pub end_time: DateTime<Utc>,
}

/// Payload of [`EventKind::TransitionComplete`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TransitionCompletePayload {
    /// The gap-filler timer.
    pub timer_id: TimerId,
    /// When the gap ended.
    pub completed_at: DateTime<Utc>,
}

/// Typed event payload, one variant per [`EventType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A timer became active.
    TimerStart(TimerStartPayload),
    /// The active timer was paused.
    TimerPause(TimerPausePayload),
    /// The active timer was resumed.
    TimerResume(TimerResumePayload),
    /// The active timer completed.
    TimerComplete(TimerEndPayload),
    /// The active timer was skipped.
    TimerSkip(TimerEndPayload),
    /// An item joined the queue.
    QueueAdd(QueueItem),
    /// An item left the queue.
    QueueRemove(QueueRemovePayload),
    /// The queue was emptied.
    QueueClear,
    /// Everything was reset.
    ResetAll(ResetAllPayload),
    /// A transition gap-filler began.
    TransitionStart(TransitionStartPayload),
    /// A transition gap-filler ended.
    TransitionComplete(TransitionCompletePayload),
}

impl EventKind {
    /// The closed-set type tag for this payload.
    pub const fn event_type(&self) -> EventType {
        match self {
            Self::TimerStart(_) => EventType::TimerStart,
            Self::TimerPause(_) => EventType::TimerPause,
            Self::TimerResume(_) => EventType::TimerResume,
            Self::TimerComplete(_) => EventType::TimerComplete,
            Self::TimerSkip(_) => EventType::TimerSkip,
            Self::QueueAdd(_) => EventType::QueueAdd,
            Self::QueueRemove(_) => EventType::QueueRemove,
            Self::QueueClear => EventType::QueueClear,
            Self::ResetAll(_) => EventType::ResetAll,
            Self::TransitionStart(_) => EventType::TransitionStart,
            Self::TransitionComplete(_) => EventType::TransitionComplete,
        }
    }

    /// Serialize the payload alone. `QueueClear` has none.
    pub fn payload_json(&self) -> Result<Option<serde_json::Value>, serde_json::Error> {
        let value = match self {
            Self::TimerStart(p) => serde_json::to_value(p)?,
            Self::TimerPause(p) => serde_json::to_value(p)?,
            Self::TimerResume(p) => serde_json::to_value(p)?,
            Self::TimerComplete(p) | Self::TimerSkip(p) => serde_json::to_value(p)?,
            Self::QueueAdd(p) => serde_json::to_value(p)?,
            Self::QueueRemove(p) => serde_json::to_value(p)?,
            Self::QueueClear => return Ok(None),
            Self::ResetAll(p) => serde_json::to_value(p)?,
            Self::TransitionStart(p) => serde_json::to_value(p)?,
            Self::TransitionComplete(p) => serde_json::to_value(p)?,
        };
        Ok(Some(value))
    }

    /// Rebuild a typed payload from its type tag and raw JSON.
    pub fn from_parts(
        event_type: EventType,
        payload: Option<serde_json::Value>,
    ) -> Result<Self, serde_json::Error> {
        let raw = payload.unwrap_or(serde_json::Value::Null);
        Ok(match event_type {
            EventType::TimerStart => Self::TimerStart(serde_json::from_value(raw)?),
            EventType::TimerPause => Self::TimerPause(serde_json::from_value(raw)?),
            EventType::TimerResume => Self::TimerResume(serde_json::from_value(raw)?),
            EventType::TimerComplete => Self::TimerComplete(serde_json::from_value(raw)?),
            EventType::TimerSkip => Self::TimerSkip(serde_json::from_value(raw)?),
            EventType::QueueAdd => Self::QueueAdd(serde_json::from_value(raw)?),
            EventType::QueueRemove => Self::QueueRemove(serde_json::from_value(raw)?),
            EventType::QueueClear => Self::QueueClear,
            EventType::ResetAll => Self::ResetAll(serde_json::from_value(raw)?),
            EventType::TransitionStart => Self::TransitionStart(serde_json::from_value(raw)?),
            EventType::TransitionComplete => {
                Self::TransitionComplete(serde_json::from_value(raw)?)
            }
        })
    }
}

/// An immutable record of one state transition.
///
/// On the wire an event is `{id, type, payload, timestamp}`, the same shape
/// the event log stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EventRecord", into = "EventRecord")]
pub struct Event {
    /// Unique event identifier. Breaks ties between equal timestamps.
    pub id: EventId,
    /// Authoritative occurrence time, non-decreasing per writer.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub kind: EventKind,
}

impl Event {
    /// Create an event with a fresh id.
    pub fn new(kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: EventId::new(),
            timestamp,
            kind,
        }
    }

    /// Shorthand for `self.kind.event_type()`.
    pub const fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    /// Replay order: timestamp, then id.
    pub const fn order_key(&self) -> (DateTime<Utc>, EventId) {
        (self.timestamp, self.id)
    }
}

/// Untyped event shape used for serialization and storage rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EventRecord {
    /// Unique event identifier.
    pub id: EventId,
    /// Event type tag.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Type-specific payload, absent for `QUEUE_CLEAR`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Authoritative occurrence time.
    pub timestamp: DateTime<Utc>,
}

impl TryFrom<EventRecord> for Event {
    type Error = serde_json::Error;

    fn try_from(record: EventRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            timestamp: record.timestamp,
            kind: EventKind::from_parts(record.event_type, record.payload)?,
        })
    }
}

impl From<Event> for EventRecord {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            event_type: event.kind.event_type(),
            // Payload structs contain only JSON-safe fields.
            payload: event.kind.payload_json().ok().flatten(),
            timestamp: event.timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Upper bound for [`Settings::transition_delay_seconds`].
pub const MAX_TRANSITION_DELAY_SECONDS: u32 = 60;

/// Upper bound for [`Settings::broadcast_delay_seconds`].
pub const MAX_BROADCAST_DELAY_SECONDS: u32 = 600;

/// Operator tunables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Settings {
    /// Gap inserted between a finished countdown and the next queued one.
    pub transition_delay_seconds: u32,
    /// Lag of the delayed broadcast view.
    pub broadcast_delay_seconds: u32,
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Authoritative state as served by the state endpoint and live stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct StateSnapshot {
    /// The active timer, if any.
    pub current_timer: Option<Timer>,
    /// Pending items ordered by position.
    pub queue: Vec<QueueItem>,
    /// Server clock at snapshot time.
    pub server_time: DateTime<Utc>,
}

/// The delayed replica's projection of a timer.
///
/// Times are relative to the moment the event was replayed, not when it
/// originally happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ReplicaTimer {
    /// Source timer id.
    pub id: TimerId,
    /// Display label.
    pub name: String,
    /// Countdown length.
    pub duration_seconds: u32,
    /// Replay start time.
    pub start_time: DateTime<Utc>,
    /// Replay end time.
    pub end_time: DateTime<Utc>,
    /// Whether frozen.
    pub paused: bool,
    /// Replay pause instant.
    pub paused_at: Option<DateTime<Utc>>,
    /// Whether this is a transition gap-filler.
    pub is_transition: bool,
}

impl ReplicaTimer {
    /// Milliseconds left, floored at zero, frozen while paused.
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> i64 {
        let reference = match (self.paused, self.paused_at) {
            (true, Some(at)) => at,
            _ => now,
        };
        millis_between(self.end_time, reference).max(0)
    }
}

/// State rebuilt by a delayed replica purely from replayed events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ReplicaState {
    /// The replayed active timer, if any.
    pub current_timer: Option<ReplicaTimer>,
    /// Replayed queue ordered by position.
    pub queue: Vec<QueueItem>,
    /// Whether a transition gap-filler is showing.
    pub is_transitioning: bool,
    /// End of the showing gap-filler.
    pub transition_end_time: Option<DateTime<Utc>>,
}
