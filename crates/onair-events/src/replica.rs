//! Background replica actor.
//!
//! [`spawn_replica`] starts three tasks per delayed view:
//!
//! - a fetcher that bootstraps from the log and re-polls it on a fixed
//!   refresh interval, so missed pushes are recovered
//! - an optional push forwarder relaying freshly appended events
//! - the actor itself, which owns the [`Reconstructor`], matures pending
//!   events on its own tick, and publishes a [`ReplicaView`]
//!
//! The fetcher and the actor never wait on each other: a slow fetch cannot
//! stall maturation.

use std::time::Duration;

use chrono::{DateTime, Utc};
use onair_types::{Clock, Event, ReplicaState, seconds_before};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::reconstructor::Reconstructor;
use crate::source::EventSource;

/// Inbox depth between the feeder tasks and the actor.
const INBOX_CAPACITY: usize = 256;

/// Tunables for one replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaOptions {
    /// Initial broadcast delay.
    pub delay_seconds: u32,
    /// Maturation tick.
    pub maturation_interval: Duration,
    /// Re-poll interval of the event source.
    pub refresh_interval: Duration,
    /// History fetched on attach beyond the delay.
    pub lookback_seconds: u64,
    /// Page size for fetches.
    pub fetch_limit: u32,
}

impl ReplicaOptions {
    /// Defaults: 100 ms tick, 5 s refresh, 5 min lookback, 1000-event pages.
    pub const fn new(delay_seconds: u32) -> Self {
        Self {
            delay_seconds,
            maturation_interval: Duration::from_millis(100),
            refresh_interval: Duration::from_secs(5),
            lookback_seconds: 300,
            fetch_limit: 1000,
        }
    }
}

/// What a delayed-view subscriber sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaView {
    /// Replayed state.
    pub state: ReplicaState,
    /// `false` after a failed fetch until the next successful one.
    pub connected: bool,
    /// Events applied so far.
    pub applied_events: u64,
    /// Events waiting to mature.
    pub pending_events: usize,
    /// Current lag.
    pub delay_seconds: u32,
    /// Clock reading when this view was published.
    pub server_time: DateTime<Utc>,
}

impl ReplicaView {
    fn empty(delay_seconds: u32, now: DateTime<Utc>) -> Self {
        Self {
            state: ReplicaState::default(),
            connected: false,
            applied_events: 0,
            pending_events: 0,
            delay_seconds,
            server_time: now,
        }
    }
}

/// The replica task has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("replica task has stopped")]
pub struct ReplicaClosed;

#[derive(Debug)]
enum Input {
    Fetched(Vec<Event>),
    FetchFailed,
    Pushed(Event),
    SetDelay(u32),
}

/// Owner of a running replica. Dropping it stops every task.
#[derive(Debug)]
pub struct ReplicaHandle {
    view: watch::Receiver<ReplicaView>,
    inbox: mpsc::Sender<Input>,
    tasks: Vec<JoinHandle<()>>,
}

impl ReplicaHandle {
    /// A receiver notified on every published change.
    pub fn subscribe(&self) -> watch::Receiver<ReplicaView> {
        self.view.clone()
    }

    /// The latest published view.
    pub fn current(&self) -> ReplicaView {
        self.view.borrow().clone()
    }

    /// Change the lag from now on. Past state is not re-derived.
    pub async fn set_delay(&self, delay_seconds: u32) -> Result<(), ReplicaClosed> {
        if self.inbox.send(Input::SetDelay(delay_seconds)).await.is_err() {
            return Err(ReplicaClosed);
        }
        Ok(())
    }
}

impl Drop for ReplicaHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Start a replica reading `source`, optionally fed live by `push`.
///
/// Subscribe `push` before calling so no event falls between the bootstrap
/// fetch and the first pushed event.
pub fn spawn_replica(
    source: EventSource,
    push: Option<broadcast::Receiver<Event>>,
    clock: Clock,
    options: ReplicaOptions,
) -> ReplicaHandle {
    let (inbox, rx) = mpsc::channel(INBOX_CAPACITY);
    let (view_tx, view) = watch::channel(ReplicaView::empty(options.delay_seconds, clock.now()));

    let mut tasks = Vec::with_capacity(3);
    tasks.push(tokio::spawn(run_fetcher(
        source,
        clock.clone(),
        options,
        inbox.clone(),
    )));
    if let Some(push) = push {
        tasks.push(tokio::spawn(run_push_forwarder(push, inbox.clone())));
    }
    tasks.push(tokio::spawn(run_actor(
        Reconstructor::new(options.delay_seconds),
        clock,
        options.maturation_interval,
        rx,
        view_tx,
    )));

    tracing::debug!(delay_seconds = options.delay_seconds, "Replica started");
    ReplicaHandle { view, inbox, tasks }
}

async fn run_fetcher(
    source: EventSource,
    clock: Clock,
    options: ReplicaOptions,
    inbox: mpsc::Sender<Input>,
) {
    let reach = u64::from(options.delay_seconds).saturating_add(options.lookback_seconds);
    let mut since = seconds_before(clock.now(), reach);
    let mut ticker = tokio::time::interval(options.refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let input = match source.fetch_all(since, options.fetch_limit).await {
            Ok(events) => {
                if let Some(newest) = events.iter().map(|e| e.timestamp).max() {
                    since = since.max(newest);
                }
                Input::Fetched(events)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Replica fetch failed, keeping last state");
                Input::FetchFailed
            }
        };
        if inbox.send(input).await.is_err() {
            break;
        }
    }
}

async fn run_push_forwarder(mut push: broadcast::Receiver<Event>, inbox: mpsc::Sender<Input>) {
    loop {
        match push.recv().await {
            Ok(event) => {
                if inbox.send(Input::Pushed(event)).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Replica push lagged, refresh will catch up");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn run_actor(
    mut replica: Reconstructor,
    clock: Clock,
    maturation_interval: Duration,
    mut inbox: mpsc::Receiver<Input>,
    view: watch::Sender<ReplicaView>,
) {
    let mut ticker = tokio::time::interval(maturation_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut connected = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            input = inbox.recv() => match input {
                Some(Input::Fetched(events)) => {
                    connected = true;
                    for event in events {
                        replica.ingest(event);
                    }
                }
                Some(Input::FetchFailed) => connected = false,
                Some(Input::Pushed(event)) => {
                    replica.ingest(event);
                }
                Some(Input::SetDelay(delay_seconds)) => {
                    tracing::debug!(delay_seconds, "Replica delay changed");
                    replica.set_delay(delay_seconds);
                }
                None => break,
            },
        }

        let now = clock.now();
        replica.mature(now);
        publish(&view, &replica, connected, now);
    }
}

fn publish(
    view: &watch::Sender<ReplicaView>,
    replica: &Reconstructor,
    connected: bool,
    now: DateTime<Utc>,
) {
    view.send_if_modified(|current| {
        let changed = current.connected != connected
            || current.applied_events != replica.applied_count()
            || current.pending_events != replica.pending_count()
            || current.delay_seconds != replica.delay_seconds()
            || current.state != *replica.state();
        if changed {
            *current = ReplicaView {
                state: replica.state().clone(),
                connected,
                applied_events: replica.applied_count(),
                pending_events: replica.pending_count(),
                delay_seconds: replica.delay_seconds(),
                server_time: now,
            };
        }
        changed
    });
}
