//! Pure state folding for delayed replicas.
//!
//! [`fold`] applies one event to a [`ReplicaState`]. Every time field is
//! recomputed from the replay instant `now` rather than copied from the
//! event, so a view replayed `D` seconds late still counts down smoothly
//! from the full remaining time.

use chrono::{DateTime, Utc};
use onair_types::{
    Event, EventKind, ReplicaState, ReplicaTimer, TRANSITION_TIMER_NAME, millis_between,
    shift_millis,
};

/// Apply `event` to `state` as of the replay instant `now`.
pub fn fold(mut state: ReplicaState, event: &Event, now: DateTime<Utc>) -> ReplicaState {
    match &event.kind {
        EventKind::TimerStart(p) => {
            state.current_timer = Some(ReplicaTimer {
                id: p.timer_id,
                name: p.name.clone(),
                duration_seconds: p.duration_seconds,
                start_time: now,
                end_time: seconds_after(now, p.duration_seconds),
                paused: p.paused,
                paused_at: p.paused.then_some(now),
                is_transition: false,
            });
            state.is_transitioning = false;
            state.transition_end_time = None;
        }
        EventKind::TimerPause(_) => {
            if let Some(timer) = state.current_timer.as_mut() {
                timer.paused = true;
                timer.paused_at = Some(now);
            }
        }
        EventKind::TimerResume(_) => {
            if let Some(timer) = state.current_timer.as_mut() {
                let paused_for = timer
                    .paused_at
                    .map_or(0, |at| millis_between(now, at).max(0));
                timer.end_time = shift_millis(timer.end_time, paused_for);
                timer.paused = false;
                timer.paused_at = None;
            }
        }
        EventKind::TimerComplete(_) | EventKind::TimerSkip(_) => {
            state.current_timer = None;
        }
        EventKind::QueueAdd(item) => {
            state.queue.retain(|i| i.id != item.id);
            state.queue.push(item.clone());
            state.queue.sort_by(|a, b| a.position.cmp(&b.position));
        }
        EventKind::QueueRemove(p) => {
            state.queue.retain(|i| i.id != p.item_id);
        }
        EventKind::QueueClear => {
            state.queue.clear();
        }
        EventKind::ResetAll(_) => {
            state = ReplicaState::default();
        }
        EventKind::TransitionStart(p) => {
            let end_time = seconds_after(now, p.duration_seconds);
            state.current_timer = Some(ReplicaTimer {
                id: p.timer_id,
                name: TRANSITION_TIMER_NAME.to_owned(),
                duration_seconds: p.duration_seconds,
                start_time: now,
                end_time,
                paused: false,
                paused_at: None,
                is_transition: true,
            });
            state.is_transitioning = true;
            state.transition_end_time = Some(end_time);
        }
        EventKind::TransitionComplete(_) => {
            state.current_timer = None;
            state.is_transitioning = false;
            state.transition_end_time = None;
        }
    }
    state
}

fn seconds_after(now: DateTime<Utc>, seconds: u32) -> DateTime<Utc> {
    shift_millis(now, i64::from(seconds).saturating_mul(1000))
}
