//! Injectable wall clock and millisecond time arithmetic.
//!
//! Every component that reads "now" takes a [`Clock`] instead of calling
//! `Utc::now()` directly, so tests can drive time by hand. All instants are
//! truncated to millisecond precision, the resolution of the event log.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Source of the current instant.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    /// Real wall-clock time.
    #[default]
    System,
    /// Hand-driven time in Unix milliseconds, shared between clones.
    Manual(Arc<AtomicI64>),
}

impl Clock {
    /// A manual clock starting at `start`.
    pub fn manual(start: DateTime<Utc>) -> Self {
        Self::Manual(Arc::new(AtomicI64::new(start.timestamp_millis())))
    }

    /// The current instant at millisecond precision.
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Self::System => {
                let now = Utc::now();
                DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
            }
            Self::Manual(millis) => {
                DateTime::from_timestamp_millis(millis.load(Ordering::SeqCst)).unwrap_or_default()
            }
        }
    }

    /// Move a manual clock forward. No effect on the system clock.
    pub fn advance(&self, by: Duration) {
        if let Self::Manual(millis) = self {
            let step = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
            millis.fetch_add(step, Ordering::SeqCst);
        }
    }

    /// Set a manual clock to `to`. No effect on the system clock.
    pub fn set(&self, to: DateTime<Utc>) {
        if let Self::Manual(millis) = self {
            millis.store(to.timestamp_millis(), Ordering::SeqCst);
        }
    }
}

/// `at` shifted by `millis` (negative moves backwards). Saturates at the
/// representable range by returning `at` unchanged.
pub fn shift_millis(at: DateTime<Utc>, millis: i64) -> DateTime<Utc> {
    TimeDelta::try_milliseconds(millis)
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(at)
}

/// Signed milliseconds from `earlier` to `later`.
pub fn millis_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> i64 {
    later.signed_duration_since(earlier).num_milliseconds()
}

/// `at` moved back by whole seconds.
pub fn seconds_before(at: DateTime<Utc>, seconds: u64) -> DateTime<Utc> {
    let millis = i64::try_from(seconds).unwrap_or(i64::MAX).saturating_mul(1000);
    shift_millis(at, millis.saturating_neg())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_and_shares_state() {
        let start = DateTime::from_timestamp_millis(10_000).unwrap();
        let clock = Clock::manual(start);
        let handle = clock.clone();
        handle.advance(Duration::from_millis(1_500));
        assert_eq!(clock.now().timestamp_millis(), 11_500);
        clock.set(start);
        assert_eq!(handle.now(), start);
    }

    #[test]
    fn system_clock_is_millisecond_precision() {
        let now = Clock::System.now();
        assert_eq!(now.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn shifting_and_measuring_agree() {
        let base = DateTime::from_timestamp_millis(50_000).unwrap();
        let later = shift_millis(base, 2_250);
        assert_eq!(millis_between(later, base), 2_250);
        assert_eq!(millis_between(base, later), -2_250);
        assert_eq!(seconds_before(base, 20).timestamp_millis(), 30_000);
    }
}
