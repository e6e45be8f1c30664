//! Event types for the append-only stream log
//!
//! An [`Event`] is created only by an event stream when a [`NewEvent`] draft is
//! appended. Once created it is shared as `Arc<Event>` and never mutated.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ids::{EventId, StreamId};

/// An immutable event in a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Stream this event belongs to
    pub stream_id: StreamId,

    /// Position within the stream
    pub id: EventId,

    /// Payload, may contain embedded line breaks
    pub data: String,

    /// Optional event name (`event:` field)
    #[serde(rename = "event", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    /// Optional comment sent alongside the event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Reconnection hint for clients, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_ms: Option<u64>,

    /// Unix timestamp (milliseconds) when the event was appended
    pub created_at: i64,
}

impl Event {
    /// Materialize a draft at the given position
    pub(crate) fn from_draft(stream_id: StreamId, id: EventId, draft: NewEvent) -> Self {
        Self {
            stream_id,
            id,
            data: draft.data,
            event_type: draft.event_type,
            comment: draft.comment,
            retry_ms: draft.retry_ms,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Reconnection hint as a duration
    pub fn retry(&self) -> Option<Duration> {
        self.retry_ms.map(Duration::from_millis)
    }
}

/// Draft of an event to append
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub data: String,
    #[serde(rename = "event", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_ms: Option<u64>,
}

impl NewEvent {
    /// Create a draft carrying only a payload
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    /// Set the event name
    pub fn with_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Attach a comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Attach a reconnection hint
    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry_ms = Some(retry.as_millis() as u64);
        self
    }
}

impl From<&str> for NewEvent {
    fn from(data: &str) -> Self {
        Self::new(data)
    }
}

impl From<String> for NewEvent {
    fn from(data: String) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_builder() {
        let draft = NewEvent::new("line1\nline2")
            .with_type("price")
            .with_comment("tick")
            .with_retry(Duration::from_secs(2));

        assert_eq!(draft.data, "line1\nline2");
        assert_eq!(draft.event_type.as_deref(), Some("price"));
        assert_eq!(draft.comment.as_deref(), Some("tick"));
        assert_eq!(draft.retry_ms, Some(2000));
    }

    #[test]
    fn test_event_from_draft_keeps_fields() {
        let stream_id = StreamId::generate();
        let event = Event::from_draft(
            stream_id,
            EventId::new(3),
            NewEvent::new("payload").with_retry(Duration::from_millis(1500)),
        );

        assert_eq!(event.stream_id, stream_id);
        assert_eq!(event.id, EventId::new(3));
        assert_eq!(event.data, "payload");
        assert_eq!(event.retry(), Some(Duration::from_millis(1500)));
        assert!(event.created_at > 0);
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::from_draft(
            StreamId::generate(),
            EventId::new(1),
            NewEvent::new("hello").with_type("greeting"),
        );

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"id\":1"));
        assert!(json.contains("\"event\":\"greeting\""));
        assert!(!json.contains("retry_ms"));
    }

    #[test]
    fn test_new_event_deserializes_minimal_body() {
        let draft: NewEvent = serde_json::from_str(r#"{"data":"x"}"#).unwrap();
        assert_eq!(draft, NewEvent::new("x"));
    }
}
