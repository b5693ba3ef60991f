//! Scenario tests for the authoritative timer/queue engine.
//!
//! Every test runs against the in-memory store with a hand-driven clock,
//! so countdown arithmetic is exact.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::too_many_lines,
    clippy::panic,
    clippy::arithmetic_side_effects
)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use onair_core::{ControlOutcome, EngineError, StartOutcome, TimerEngine, ValidationError};
use onair_store::{Fault, MemoryStore, Store};
use onair_types::{Clock, ControlAction, EventType, MATCH_TIMER_NAME, Timer, TimerStatus};
use rust_decimal::Decimal;

// =============================================================================
// Helpers
// =============================================================================

struct Harness {
    memory: Arc<MemoryStore>,
    clock: Clock,
    engine: Arc<TimerEngine>,
}

fn harness() -> Harness {
    let memory = Arc::new(MemoryStore::new());
    let clock = Clock::manual(DateTime::from_timestamp_millis(1_700_000_000_000).unwrap());
    let engine = Arc::new(TimerEngine::new(
        Store::Memory(Arc::clone(&memory)),
        clock.clone(),
    ));
    Harness {
        memory,
        clock,
        engine,
    }
}

impl Harness {
    fn advance_secs(&self, secs: u64) {
        self.clock.advance(Duration::from_secs(secs));
    }

    async fn active(&self) -> Option<Timer> {
        self.engine.state().await.unwrap().current_timer
    }

    async fn event_types(&self) -> Vec<EventType> {
        self.memory
            .all_events()
            .await
            .iter()
            .map(onair_types::Event::event_type)
            .collect()
    }

    async fn set_transition_delay(&self, seconds: i64) {
        self.engine
            .update_settings(onair_core::SettingsUpdate {
                transition_delay_seconds: Some(seconds),
                broadcast_delay_seconds: None,
            })
            .await
            .unwrap();
    }

    async fn assert_single_active(&self) {
        let active = self.engine.store().active_timers().await.unwrap();
        assert!(active.len() <= 1, "more than one active timer: {active:?}");
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn start_on_empty_system_runs_immediately() {
    let h = harness();
    let outcome = h.engine.start_or_queue("Team A", 30, false).await.unwrap();
    assert!(matches!(outcome, StartOutcome::Started(_)));

    let timer = h.active().await.unwrap();
    assert_eq!(timer.name, "Team A");
    assert_eq!(timer.status, TimerStatus::Active);
    assert!(!timer.paused);
    assert_eq!(timer.remaining_ms(h.clock.now()), 30_000);
    assert_eq!(h.event_types().await, vec![EventType::TimerStart]);
}

#[tokio::test]
async fn priority_match_interrupts_and_requeues_remainder() {
    let h = harness();
    h.engine.start_or_queue("Team A", 30, false).await.unwrap();
    h.advance_secs(10);

    let outcome = h
        .engine
        .start_or_queue(MATCH_TIMER_NAME, 0, true)
        .await
        .unwrap();
    let StartOutcome::Started(matched) = outcome else {
        panic!("priority start should start immediately");
    };
    assert!(matched.paused);

    let timers = h.memory.all_timers().await;
    assert_eq!(timers[0].name, "Team A");
    assert_eq!(timers[0].status, TimerStatus::Interrupted);

    let state = h.engine.state().await.unwrap();
    assert_eq!(state.current_timer.unwrap().name, MATCH_TIMER_NAME);
    assert_eq!(state.queue.len(), 1);
    assert_eq!(state.queue[0].name, "Team A");
    assert_eq!(state.queue[0].position, Decimal::new(5, 1));
    assert_eq!(state.queue[0].duration_seconds, 20);

    assert_eq!(
        h.event_types().await,
        vec![
            EventType::TimerStart,
            EventType::QueueAdd,
            EventType::TimerStart
        ]
    );
}

#[tokio::test]
async fn resuming_match_completes_it_and_runs_transition() {
    let h = harness();
    h.set_transition_delay(5).await;
    h.engine
        .start_or_queue(MATCH_TIMER_NAME, 0, false)
        .await
        .unwrap();
    h.engine.start_or_queue("Team B", 45, false).await.unwrap();

    let outcome = h.engine.resume().await.unwrap();
    assert_eq!(outcome, ControlOutcome::Applied);

    let matched = h
        .memory
        .all_timers()
        .await
        .into_iter()
        .find(|t| t.name == MATCH_TIMER_NAME)
        .unwrap();
    assert_eq!(matched.status, TimerStatus::Completed);

    let transition = h.active().await.unwrap();
    assert!(transition.is_transition());
    assert_eq!(transition.duration_seconds, 5);

    h.advance_secs(5);
    assert_eq!(
        h.engine.complete(transition.id).await.unwrap(),
        ControlOutcome::Applied
    );
    let next = h.active().await.unwrap();
    assert_eq!(next.name, "Team B");
    assert!(h.engine.state().await.unwrap().queue.is_empty());

    assert_eq!(
        h.event_types().await,
        vec![
            EventType::TimerStart,
            EventType::QueueAdd,
            EventType::TimerComplete,
            EventType::TransitionStart,
            EventType::TransitionComplete,
            EventType::QueueRemove,
            EventType::TimerStart,
        ]
    );
}

#[tokio::test]
async fn completion_with_empty_queue_leaves_slot_idle() {
    let h = harness();
    let StartOutcome::Started(timer) = h.engine.start_or_queue("Solo", 10, false).await.unwrap()
    else {
        panic!("expected start");
    };
    h.advance_secs(10);
    h.engine.complete(timer.id).await.unwrap();
    assert!(h.active().await.is_none());
}

#[tokio::test]
async fn no_transition_when_delay_is_zero() {
    let h = harness();
    let StartOutcome::Started(first) = h.engine.start_or_queue("A", 10, false).await.unwrap()
    else {
        panic!("expected start");
    };
    h.engine.start_or_queue("B", 10, false).await.unwrap();
    h.engine.complete(first.id).await.unwrap();
    assert_eq!(h.active().await.unwrap().name, "B");
}

#[tokio::test]
async fn reset_cancels_everything_with_one_event() {
    let h = harness();
    h.engine.start_or_queue("A", 30, false).await.unwrap();
    h.engine.start_or_queue("B", 30, false).await.unwrap();
    h.engine.start_or_queue("C", 30, false).await.unwrap();
    let before = h.memory.all_events().await.len();

    h.engine.reset_all().await.unwrap();

    assert!(
        h.memory
            .all_timers()
            .await
            .iter()
            .all(|t| t.status == TimerStatus::Cancelled)
    );
    let state = h.engine.state().await.unwrap();
    assert!(state.current_timer.is_none());
    assert!(state.queue.is_empty());

    let events = h.event_types().await;
    assert_eq!(events.len(), before + 1);
    assert_eq!(events.last(), Some(&EventType::ResetAll));
}

// =============================================================================
// Idempotence and concurrency
// =============================================================================

#[tokio::test]
async fn complete_is_idempotent() {
    let h = harness();
    let StartOutcome::Started(timer) = h.engine.start_or_queue("A", 5, false).await.unwrap()
    else {
        panic!("expected start");
    };
    h.engine.start_or_queue("B", 5, false).await.unwrap();

    assert_eq!(
        h.engine.complete(timer.id).await.unwrap(),
        ControlOutcome::Applied
    );
    let after_first = h.memory.all_events().await.len();
    assert_eq!(
        h.engine.complete(timer.id).await.unwrap(),
        ControlOutcome::Ignored
    );
    assert_eq!(h.memory.all_events().await.len(), after_first);
    assert_eq!(h.active().await.unwrap().name, "B");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_completes_advance_queue_once() {
    let h = harness();
    let StartOutcome::Started(timer) = h.engine.start_or_queue("A", 5, false).await.unwrap()
    else {
        panic!("expected start");
    };
    h.engine.start_or_queue("B", 5, false).await.unwrap();
    h.engine.start_or_queue("C", 5, false).await.unwrap();
    h.advance_secs(5);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&h.engine);
        tasks.push(tokio::spawn(async move { engine.complete(timer.id).await }));
    }
    let mut applied = 0;
    for task in tasks {
        if task.await.unwrap().unwrap() == ControlOutcome::Applied {
            applied += 1;
        }
    }

    assert_eq!(applied, 1);
    assert_eq!(h.active().await.unwrap().name, "B");
    assert_eq!(h.engine.state().await.unwrap().queue.len(), 1);
    h.assert_single_active().await;
}

#[tokio::test]
async fn at_most_one_active_through_scripted_sequence() {
    let h = harness();
    h.set_transition_delay(3).await;
    h.engine.start_or_queue("A", 30, false).await.unwrap();
    h.assert_single_active().await;
    h.engine.start_or_queue("B", 30, false).await.unwrap();
    h.assert_single_active().await;
    h.engine.start_or_queue("P", 10, true).await.unwrap();
    h.assert_single_active().await;
    h.engine.pause().await.unwrap();
    h.engine.skip().await.unwrap();
    h.assert_single_active().await;
    h.engine.skip().await.unwrap();
    h.assert_single_active().await;
    h.engine.start_or_queue(MATCH_TIMER_NAME, 0, true).await.unwrap();
    h.assert_single_active().await;
    h.engine.resume().await.unwrap();
    h.assert_single_active().await;
    h.engine.reset_all().await.unwrap();
    h.assert_single_active().await;
}

// =============================================================================
// Queue ordering
// =============================================================================

#[tokio::test]
async fn tail_positions_count_up_from_one() {
    let h = harness();
    h.engine.start_or_queue("A", 10, false).await.unwrap();
    for name in ["B", "C", "D"] {
        h.engine.start_or_queue(name, 10, false).await.unwrap();
    }
    let positions: Vec<Decimal> = h
        .engine
        .state()
        .await
        .unwrap()
        .queue
        .iter()
        .map(|i| i.position)
        .collect();
    assert_eq!(
        positions,
        vec![Decimal::from(1), Decimal::from(2), Decimal::from(3)]
    );
}

#[tokio::test]
async fn repeated_priority_interrupts_stay_strictly_ordered() {
    let h = harness();
    h.engine.start_or_queue("A", 60, false).await.unwrap();
    h.engine.start_or_queue("Q", 60, false).await.unwrap();
    h.engine.start_or_queue("B", 60, true).await.unwrap();
    h.engine.start_or_queue("C", 60, true).await.unwrap();

    let queue = h.engine.state().await.unwrap().queue;
    let names: Vec<&str> = queue.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["B", "A", "Q"]);
    assert_eq!(queue[0].position, Decimal::new(-5, 1));
    assert_eq!(queue[1].position, Decimal::new(5, 1));
    assert!(queue.windows(2).all(|w| w[0].position < w[1].position));
}

#[tokio::test]
async fn two_hundred_priority_starts_keep_the_queue_ordered() {
    let h = harness();
    h.engine.start_or_queue("T0", 60, false).await.unwrap();
    h.engine.start_or_queue("Tail", 60, false).await.unwrap();

    for n in 1..200 {
        let name = format!("T{n}");
        let outcome = h.engine.start_or_queue(&name, 60, true).await.unwrap();
        assert!(matches!(outcome, StartOutcome::Started(_)), "start #{n}");
        h.advance_secs(1);
    }

    h.assert_single_active().await;
    assert_eq!(h.active().await.unwrap().name, "T199");

    let queue = h.engine.state().await.unwrap().queue;
    assert_eq!(queue.len(), 200);
    assert!(queue.windows(2).all(|w| w[0].position < w[1].position));
    // Most recently interrupted first, the ordinary item last.
    assert_eq!(queue[0].name, "T198");
    assert_eq!(queue[0].duration_seconds, 59);
    assert_eq!(queue[198].name, "T0");
    assert_eq!(queue[199].name, "Tail");
}

#[tokio::test]
async fn interrupting_a_transition_drops_it() {
    let h = harness();
    h.set_transition_delay(10).await;
    let StartOutcome::Started(a) = h.engine.start_or_queue("A", 5, false).await.unwrap() else {
        panic!("expected start");
    };
    h.engine.start_or_queue("B", 5, false).await.unwrap();
    h.engine.complete(a.id).await.unwrap();
    assert!(h.active().await.unwrap().is_transition());

    h.engine.start_or_queue("Urgent", 20, true).await.unwrap();
    let state = h.engine.state().await.unwrap();
    assert_eq!(state.current_timer.unwrap().name, "Urgent");
    let names: Vec<&str> = state.queue.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["B"]);
    assert_eq!(
        h.event_types().await.last(),
        Some(&EventType::TimerStart)
    );
}

// =============================================================================
// Pause / resume / skip
// =============================================================================

#[tokio::test]
async fn pause_freezes_and_resume_shifts_end() {
    let h = harness();
    h.engine.start_or_queue("A", 30, false).await.unwrap();
    h.advance_secs(5);
    assert_eq!(h.engine.pause().await.unwrap(), ControlOutcome::Applied);
    assert_eq!(h.engine.pause().await.unwrap(), ControlOutcome::Ignored);

    h.advance_secs(10);
    let paused = h.active().await.unwrap();
    assert_eq!(paused.remaining_ms(h.clock.now()), 25_000);

    assert_eq!(h.engine.resume().await.unwrap(), ControlOutcome::Applied);
    let resumed = h.active().await.unwrap();
    assert!(!resumed.paused);
    assert!(resumed.paused_at.is_none());
    assert_eq!(resumed.remaining_ms(h.clock.now()), 25_000);
    assert_eq!(h.engine.resume().await.unwrap(), ControlOutcome::Ignored);
}

#[tokio::test]
async fn controls_without_active_timer_are_noops() {
    let h = harness();
    assert_eq!(h.engine.pause().await.unwrap(), ControlOutcome::Ignored);
    assert_eq!(h.engine.resume().await.unwrap(), ControlOutcome::Ignored);
    assert_eq!(h.engine.skip().await.unwrap(), ControlOutcome::Ignored);
    assert!(h.memory.all_events().await.is_empty());
}

#[tokio::test]
async fn skipping_transition_emits_transition_complete() {
    let h = harness();
    h.set_transition_delay(5).await;
    h.engine.start_or_queue("A", 30, false).await.unwrap();
    h.engine.start_or_queue("B", 30, false).await.unwrap();
    h.engine.skip().await.unwrap();
    assert!(h.active().await.unwrap().is_transition());

    h.engine.skip().await.unwrap();
    let types = h.event_types().await;
    assert!(types.contains(&EventType::TransitionComplete));
    assert_eq!(
        types.iter().filter(|t| **t == EventType::TimerSkip).count(),
        1
    );
    assert_eq!(h.active().await.unwrap().name, "B");
}

#[tokio::test]
async fn control_dispatch_requires_id_for_complete() {
    let h = harness();
    let err = h
        .engine
        .control(ControlAction::Complete, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::MissingTimerId)
    ));
}

// =============================================================================
// Failure handling
// =============================================================================

#[tokio::test]
async fn event_log_failure_does_not_block_mutation() {
    let h = harness();
    h.memory.set_failing(Fault::EventLog, true);
    let mut rx = h.engine.subscribe();

    h.engine.start_or_queue("A", 30, false).await.unwrap();
    assert_eq!(h.active().await.unwrap().name, "A");
    assert!(h.memory.all_events().await.is_empty());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn settings_failure_means_no_transition() {
    let h = harness();
    h.set_transition_delay(5).await;
    let StartOutcome::Started(a) = h.engine.start_or_queue("A", 5, false).await.unwrap() else {
        panic!("expected start");
    };
    h.engine.start_or_queue("B", 5, false).await.unwrap();

    h.memory.set_failing(Fault::Settings, true);
    h.engine.complete(a.id).await.unwrap();
    assert_eq!(h.active().await.unwrap().name, "B");
}

#[tokio::test]
async fn document_store_failure_surfaces() {
    let h = harness();
    h.memory.set_failing(Fault::Documents, true);
    let err = h.engine.start_or_queue("A", 30, false).await.unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
}

#[tokio::test]
async fn invalid_input_rejected() {
    let h = harness();
    for (name, secs) in [("", 10), ("  ", 10), ("transition", 10), ("A", 7201), ("A", -1)] {
        let err = h.engine.start_or_queue(name, secs, false).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)), "{name:?} {secs}");
    }
    assert!(h.engine.start_or_queue("A", 7200, false).await.is_ok());
}

// =============================================================================
// Events and expiry
// =============================================================================

#[tokio::test]
async fn event_timestamps_never_go_backwards() {
    let h = harness();
    h.engine.start_or_queue("A", 30, false).await.unwrap();
    let first = h.clock.now();
    h.clock
        .set(DateTime::<Utc>::from_timestamp_millis(first.timestamp_millis() - 5_000).unwrap());
    h.engine.pause().await.unwrap();

    let events = h.memory.all_events().await;
    assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test]
async fn subscribers_receive_appended_events() {
    let h = harness();
    let mut rx = h.engine.subscribe();
    let mut revision = h.engine.watch_revision();
    h.engine.start_or_queue("A", 30, false).await.unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.event_type(), EventType::TimerStart);
    assert!(revision.has_changed().unwrap());
}

#[tokio::test]
async fn expiry_check_completes_only_finished_unpaused_timers() {
    let h = harness();
    h.engine.start_or_queue("A", 10, false).await.unwrap();
    assert_eq!(
        h.engine.complete_if_expired().await.unwrap(),
        ControlOutcome::Ignored
    );
    h.advance_secs(10);
    assert_eq!(
        h.engine.complete_if_expired().await.unwrap(),
        ControlOutcome::Applied
    );
    assert!(h.active().await.is_none());

    h.engine
        .start_or_queue(MATCH_TIMER_NAME, 0, false)
        .await
        .unwrap();
    h.advance_secs(60);
    assert_eq!(
        h.engine.complete_if_expired().await.unwrap(),
        ControlOutcome::Ignored
    );
}
