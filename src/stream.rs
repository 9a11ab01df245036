// src/stream.rs
//! Event Stream Writer: typed messages for one client connection and their
//! Server-Sent Events framing.
//!
//! A session writes through an [`EventSink`]; the HTTP handler turns the
//! matching receiver into an SSE body with [`sse_stream`]. Each event is one
//! discrete SSE message and is flushed by the transport as soon as it is
//! polled, so nothing accumulates beyond the bounded channel.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::Event;
use futures_util::stream::{self, Stream};
use metrics::counter;
use tokio::sync::mpsc;

use crate::error::RelayError;
use crate::feed::types::{Item, ItemId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Connected,
    NewStory,
    NoNewData,
    Error,
    StoryError,
}

impl EventKind {
    /// Value of the SSE `event:` field.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Connected => "connected",
            EventKind::NewStory => "new-story",
            EventKind::NoNewData => "no-new-data",
            EventKind::Error => "error",
            EventKind::StoryError => "story-error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub kind: EventKind,
    /// Set for `new-story` only; becomes the SSE `id:` line.
    pub id: Option<ItemId>,
    pub data: String,
}

impl StreamEvent {
    pub fn connected() -> Self {
        Self::text(
            EventKind::Connected,
            format!("Connected to HN stream at {}", clock_now()),
        )
    }

    pub fn no_new_data() -> Self {
        Self::text(
            EventKind::NoNewData,
            format!("No new stories at {}", clock_now()),
        )
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self::text(EventKind::Error, msg)
    }

    pub fn story_error(msg: impl Into<String>) -> Self {
        Self::text(EventKind::StoryError, msg)
    }

    /// Serialize a validated item. Fails with `Encode` instead of sending half a message.
    pub fn new_story(item: &Item) -> Result<Self, RelayError> {
        let data = serde_json::to_string(item).map_err(|e| RelayError::Encode {
            id: item.id,
            cause: e.to_string(),
        })?;
        Ok(Self {
            kind: EventKind::NewStory,
            id: Some(item.id),
            data,
        })
    }

    fn text(kind: EventKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            id: None,
            data: msg.into(),
        }
    }

    pub fn to_sse(&self) -> Event {
        let ev = Event::default().event(self.kind.as_str());
        let ev = match self.id {
            Some(id) => ev.id(id.to_string()),
            None => ev,
        };
        ev.data(&self.data)
    }
}

/// Wall-clock time the way clients display it (`HH:MM:SS`, local time).
pub fn clock_now() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// Write half of one client connection.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
    write_timeout: Duration,
}

impl EventSink {
    /// Bounded sink/receiver pair for one session.
    pub fn channel(capacity: usize, write_timeout: Duration) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, write_timeout }, rx)
    }

    /// Hand one message to the connection.
    ///
    /// Fails fast once the client is gone and gives up after `write_timeout`
    /// if the client stops draining.
    pub async fn emit(&self, event: StreamEvent) -> Result<(), RelayError> {
        let kind = event.kind;
        let res = match tokio::time::timeout(self.write_timeout, self.tx.send(event)).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(_)) => RelayError::Write("client disconnected".into()),
            Err(_) => RelayError::Write(format!(
                "client did not drain within {}s",
                self.write_timeout.as_secs()
            )),
        };
        counter!("relay_write_errors_total").increment(1);
        tracing::debug!(target: "relay::stream", event = kind.as_str(), error = %res, "emit failed");
        Err(res)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the receiving side (the HTTP body) has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Adapt a session receiver into the body stream of an `axum::response::Sse`.
pub fn sse_stream(
    rx: mpsc::Receiver<StreamEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    stream::unfold(rx, |mut rx| async move {
        let ev = rx.recv().await?;
        Some((Ok(ev.to_sse()), rx))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_story_carries_id_and_json() {
        let ev = StreamEvent::new_story(&Item::story(4, "Foo", "http://x")).unwrap();
        assert_eq!(ev.kind, EventKind::NewStory);
        assert_eq!(ev.id, Some(4));
        let v: serde_json::Value = serde_json::from_str(&ev.data).unwrap();
        assert_eq!(v["title"], "Foo");
    }

    #[test]
    fn status_events_have_no_id() {
        assert_eq!(StreamEvent::connected().id, None);
        assert!(StreamEvent::no_new_data().data.starts_with("No new stories at "));
        assert_eq!(StreamEvent::error("boom").kind.as_str(), "error");
        assert_eq!(StreamEvent::story_error("x").kind.as_str(), "story-error");
    }

    #[tokio::test]
    async fn emit_fails_after_receiver_dropped() {
        let (sink, rx) = EventSink::channel(4, Duration::from_secs(1));
        drop(rx);
        assert!(sink.is_closed());
        let err = sink.emit(StreamEvent::error("x")).await.unwrap_err();
        assert!(err.is_write());
    }

    #[tokio::test(start_paused = true)]
    async fn emit_gives_up_on_stalled_client() {
        let (sink, _rx) = EventSink::channel(1, Duration::from_secs(5));
        sink.emit(StreamEvent::error("fills the buffer")).await.unwrap();
        let err = sink.emit(StreamEvent::error("blocked")).await.unwrap_err();
        assert!(err.to_string().contains("did not drain"));
    }

    #[tokio::test]
    async fn events_arrive_in_emit_order() {
        let (sink, mut rx) = EventSink::channel(8, Duration::from_secs(1));
        sink.emit(StreamEvent::connected()).await.unwrap();
        sink.emit(StreamEvent::error("e")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::Connected);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::Error);
    }
}
