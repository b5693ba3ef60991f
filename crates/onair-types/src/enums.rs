//! Enumeration types for the `OnAir` countdown system.
//!
//! Timer lifecycle status, the closed set of event types recorded in the
//! event log, and the operator control actions accepted by the engine.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Timer Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a [`Timer`](crate::structs::Timer).
///
/// `Active` is the only non-terminal state. At most one timer is active at
/// any instant; the other three never transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TimerStatus {
    /// Currently the "now playing" countdown (possibly paused).
    Active,
    /// Ran to zero, was skipped, or was released by an operator.
    Completed,
    /// Cancelled by a reset.
    Cancelled,
    /// Displaced by a priority start; its remainder went back to the queue.
    Interrupted,
}

impl TimerStatus {
    /// Database/text representation of this status.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Interrupted => "interrupted",
        }
    }

    /// Whether this status is terminal.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl FromStr for TimerStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "interrupted" => Ok(Self::Interrupted),
            other => Err(UnknownVariant {
                kind: "timer status",
                value: other.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Event Types
// ---------------------------------------------------------------------------

/// A type of event recorded in the event log.
///
/// The set is closed: every state transition the engine performs maps to
/// exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum EventType {
    // --- Timer ---
    /// A timer became active.
    TimerStart,
    /// The active timer was paused.
    TimerPause,
    /// The active timer was resumed.
    TimerResume,
    /// The active timer completed.
    TimerComplete,
    /// The active timer was skipped by an operator.
    TimerSkip,

    // --- Queue ---
    /// An item was added to the queue.
    QueueAdd,
    /// An item was removed from the queue.
    QueueRemove,
    /// The queue was cleared.
    QueueClear,

    // --- System ---
    /// All timers cancelled and the queue cleared.
    ResetAll,
    /// A transition gap-filler started.
    TransitionStart,
    /// A transition gap-filler ended.
    TransitionComplete,
}

impl EventType {
    /// Every event type, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::TimerStart,
        Self::TimerPause,
        Self::TimerResume,
        Self::TimerComplete,
        Self::TimerSkip,
        Self::QueueAdd,
        Self::QueueRemove,
        Self::QueueClear,
        Self::ResetAll,
        Self::TransitionStart,
        Self::TransitionComplete,
    ];

    /// Wire/database representation, e.g. `TIMER_START`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TimerStart => "TIMER_START",
            Self::TimerPause => "TIMER_PAUSE",
            Self::TimerResume => "TIMER_RESUME",
            Self::TimerComplete => "TIMER_COMPLETE",
            Self::TimerSkip => "TIMER_SKIP",
            Self::QueueAdd => "QUEUE_ADD",
            Self::QueueRemove => "QUEUE_REMOVE",
            Self::QueueClear => "QUEUE_CLEAR",
            Self::ResetAll => "RESET_ALL",
            Self::TransitionStart => "TRANSITION_START",
            Self::TransitionComplete => "TRANSITION_COMPLETE",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "event type",
                value: s.to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// Control Actions
// ---------------------------------------------------------------------------

/// An operator control action on the active timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ControlAction {
    /// Freeze the countdown.
    Pause,
    /// Unfreeze the countdown (or release a `Match` hold).
    Resume,
    /// Complete the active timer now, regardless of remaining time.
    Skip,
    /// Cancel every active timer and clear the queue.
    Reset,
    /// Complete a specific timer if it is still the active one.
    Complete,
}

impl ControlAction {
    /// The wire name, e.g. `"pause"`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Skip => "skip",
            Self::Reset => "reset",
            Self::Complete => "complete",
        }
    }
}

impl FromStr for ControlAction {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "skip" => Ok(Self::Skip),
            "reset" => Ok(Self::Reset),
            "complete" => Ok(Self::Complete),
            other => Err(UnknownVariant {
                kind: "control action",
                value: other.to_owned(),
            }),
        }
    }
}

/// A string did not name a known variant of one of the enums above.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn event_type_serializes_screaming_snake() {
        let json = serde_json::to_string(&EventType::TransitionComplete).unwrap();
        assert_eq!(json, "\"TRANSITION_COMPLETE\"");
    }

    #[test]
    fn event_type_str_matches_serde() {
        for t in EventType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json.trim_matches('"'), t.as_str());
            assert_eq!(t.as_str().parse::<EventType>().ok(), Some(t));
        }
    }

    #[test]
    fn unknown_event_type_rejected() {
        let err = "TIMER_EXPLODE".parse::<EventType>();
        assert!(err.is_err());
    }

    #[test]
    fn control_action_parses_lowercase() {
        assert_eq!("skip".parse::<ControlAction>().ok(), Some(ControlAction::Skip));
        assert!("launch".parse::<ControlAction>().is_err());
    }

    #[test]
    fn only_active_is_non_terminal() {
        assert!(!TimerStatus::Active.is_terminal());
        assert!(TimerStatus::Completed.is_terminal());
        assert!(TimerStatus::Cancelled.is_terminal());
        assert!(TimerStatus::Interrupted.is_terminal());
    }
}
