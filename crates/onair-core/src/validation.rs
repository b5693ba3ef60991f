//! Input validation for operator requests.
//!
//! Raw numbers arrive as `i64` from JSON so that negative values are
//! rejected with a clear message instead of a deserialization error.

use onair_types::{
    MAX_BROADCAST_DELAY_SECONDS, MAX_TIMER_DURATION_SECONDS, MAX_TRANSITION_DELAY_SECONDS,
    TRANSITION_TIMER_NAME,
};

/// A request was malformed. Surfaced to the caller as a 400.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Timer name missing or whitespace only.
    #[error("timer name is required and must be a non-empty string")]
    EmptyName,

    /// Timer name collides with an internal sentinel.
    #[error("timer name \"{0}\" is reserved")]
    ReservedName(String),

    /// Duration outside `0..=MAX_TIMER_DURATION_SECONDS`.
    #[error("duration must be between 0 and {max} seconds, got {value}")]
    DurationOutOfRange {
        /// Rejected value.
        value: i64,
        /// Upper bound.
        max: u32,
    },

    /// A settings value outside its bounds.
    #[error("{field} must be between 0 and {max} seconds, got {value}")]
    DelayOutOfRange {
        /// Which setting.
        field: &'static str,
        /// Rejected value.
        value: i64,
        /// Upper bound.
        max: u32,
    },

    /// `complete` was requested without a timer id.
    #[error("timer_id is required for the complete action")]
    MissingTimerId,

    /// Unknown control action.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// Unparseable identifier.
    #[error("invalid timer id: {0}")]
    InvalidTimerId(String),
}

/// Check an operator-supplied timer name.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name == TRANSITION_TIMER_NAME {
        return Err(ValidationError::ReservedName(name.to_owned()));
    }
    Ok(())
}

/// Check a countdown length and narrow it to `u32`.
pub fn validate_duration(seconds: i64) -> Result<u32, ValidationError> {
    u32::try_from(seconds)
        .ok()
        .filter(|s| *s <= MAX_TIMER_DURATION_SECONDS)
        .ok_or(ValidationError::DurationOutOfRange {
            value: seconds,
            max: MAX_TIMER_DURATION_SECONDS,
        })
}

/// Check a transition delay.
pub fn validate_transition_delay(seconds: i64) -> Result<u32, ValidationError> {
    bounded("transitionDelay", seconds, MAX_TRANSITION_DELAY_SECONDS)
}

/// Check a broadcast delay.
pub fn validate_broadcast_delay(seconds: i64) -> Result<u32, ValidationError> {
    bounded("broadcastDelay", seconds, MAX_BROADCAST_DELAY_SECONDS)
}

fn bounded(field: &'static str, value: i64, max: u32) -> Result<u32, ValidationError> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v <= max)
        .ok_or(ValidationError::DelayOutOfRange { field, value, max })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(validate_name("Team A"), Ok(()));
        assert_eq!(validate_name("   "), Err(ValidationError::EmptyName));
        assert!(matches!(
            validate_name("transition"),
            Err(ValidationError::ReservedName(_))
        ));
    }

    #[test]
    fn durations() {
        assert_eq!(validate_duration(0), Ok(0));
        assert_eq!(validate_duration(7200), Ok(7200));
        assert!(validate_duration(7201).is_err());
        assert!(validate_duration(-1).is_err());
    }

    #[test]
    fn delays() {
        assert_eq!(validate_transition_delay(60), Ok(60));
        assert!(validate_transition_delay(61).is_err());
        assert_eq!(validate_broadcast_delay(600), Ok(600));
        assert!(validate_broadcast_delay(601).is_err());
        assert!(validate_broadcast_delay(-5).is_err());
    }
}
