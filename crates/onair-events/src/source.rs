//! Where a replica reads the event log from.

use std::time::Duration;

use chrono::{DateTime, Utc};
use onair_store::{Store, StoreError};
use onair_types::{Event, EventId};
use serde::{Deserialize, Serialize};

/// Errors reading events from a source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The local store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The upstream HTTP request failed or returned an error status.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream answered with a body that is not an event page.
    #[error("malformed event page: {0}")]
    Decode(reqwest::Error),
}

/// Response body of `GET /api/events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPage {
    /// Events in replay order.
    pub events: Vec<Event>,
    /// Number of events in this page.
    pub count: usize,
}

impl EventPage {
    /// Wrap a page of events.
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            count: events.len(),
            events,
        }
    }
}

/// Reads events from a primary server's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpEventSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEventSource {
    /// A source reading from `base_url`, e.g. `http://primary:8080`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { client, base_url })
    }

    async fn fetch(
        &self,
        since: DateTime<Utc>,
        after: Option<EventId>,
        limit: u32,
    ) -> Result<Vec<Event>, SourceError> {
        let mut query = vec![
            ("since", since.timestamp_millis().to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(after) = after {
            query.push(("after", after.to_string()));
        }
        let page = self
            .client
            .get(format!("{}/api/events", self.base_url))
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json::<EventPage>()
            .await
            .map_err(SourceError::Decode)?;
        Ok(page.events)
    }
}

/// An event log reader: the local store, or a remote primary.
#[derive(Debug, Clone)]
pub enum EventSource {
    /// Same-process store.
    Store(Store),
    /// Remote primary over HTTP.
    Http(HttpEventSource),
}

impl EventSource {
    /// One page of events in replay order.
    ///
    /// Without `after` the page starts at `timestamp >= since`. With it, the
    /// page starts strictly after the `(since, after)` event, which lets a
    /// reader continue through events sharing one millisecond.
    pub async fn fetch_page(
        &self,
        since: DateTime<Utc>,
        after: Option<EventId>,
        limit: u32,
    ) -> Result<Vec<Event>, SourceError> {
        match self {
            Self::Store(store) => Ok(match after {
                Some(after) => store.events_after(since, after, limit).await?,
                None => store.events_since(since, limit).await?,
            }),
            Self::Http(http) => http.fetch(since, after, limit).await,
        }
    }

    /// Every event with `timestamp >= since`, paging until a short page.
    pub async fn fetch_all(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Event>, SourceError> {
        let limit = limit.max(1);
        let page_len = usize::try_from(limit).unwrap_or(usize::MAX);
        let mut cursor = (since, None);
        let mut all = Vec::new();
        loop {
            let page = self.fetch_page(cursor.0, cursor.1, limit).await?;
            let full = page.len() >= page_len;
            let next = page.last().map(|e| (e.timestamp, Some(e.id)));
            all.extend(page);
            match next {
                Some(next) if full => cursor = next,
                _ => break,
            }
        }
        Ok(all)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use onair_store::MemoryStore;
    use onair_types::{EventKind, ResetAllPayload};

    use super::*;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[tokio::test]
    async fn fetch_all_pages_through_the_log() {
        let memory = Arc::new(MemoryStore::new());
        for ms in 0..7 {
            let event = Event::new(
                EventKind::ResetAll(ResetAllPayload { reset_at: at(ms) }),
                at(ms),
            );
            memory.append_event(&event).await.unwrap();
        }
        let source = EventSource::Store(Store::Memory(memory));

        let events = source.fetch_all(at(0), 3).await.unwrap();
        let mut ids: Vec<_> = events.iter().map(|e| e.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 7);

        let tail = source.fetch_all(at(5), 3).await.unwrap();
        assert_eq!(tail.len(), 2);
    }

    #[tokio::test]
    async fn fetch_all_pages_through_one_crowded_millisecond() {
        let memory = Arc::new(MemoryStore::new());
        for _ in 0..7 {
            let event = Event::new(
                EventKind::ResetAll(ResetAllPayload { reset_at: at(500) }),
                at(500),
            );
            memory.append_event(&event).await.unwrap();
        }
        memory
            .append_event(&Event::new(EventKind::QueueClear, at(501)))
            .await
            .unwrap();
        let source = EventSource::Store(Store::Memory(memory));

        let events = source.fetch_all(at(500), 3).await.unwrap();
        assert_eq!(events.len(), 8);
        assert!(events.windows(2).all(|w| w[0].order_key() < w[1].order_key()));
        assert_eq!(events.last().unwrap().timestamp, at(501));
    }

    #[test]
    fn event_page_round_trips_as_json() {
        let page = EventPage::new(vec![Event::new(EventKind::QueueClear, at(1_000))]);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["count"], 1);
        assert_eq!(json["events"][0]["type"], "QUEUE_CLEAR");
        let back: EventPage = serde_json::from_value(json).unwrap();
        assert_eq!(back, page);
    }
}
