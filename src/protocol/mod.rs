//! SSE wire protocol
//!
//! Converts events to and from the `text/event-stream` format:
//!
//! ```text
//! id: <EventId>
//! event: <eventType>
//! retry: <millis>
//! : <comment>
//! data: <payload line 1>
//! data: <payload line 2>
//!
//! ```

pub mod decoder;
pub mod encoder;

use serde::{Deserialize, Serialize};

use crate::types::{Event, EventId};

pub use decoder::Decoder;
pub use encoder::{encode, encode_comment, encode_wire};

/// Content type of SSE responses
pub const CONTENT_TYPE: &str = "text/event-stream";

/// Request header carrying the resume token
pub const LAST_EVENT_ID_HEADER: &str = "Last-Event-ID";

/// Response header naming the oldest retained ID on a 410
pub const OLDEST_RETAINED_HEADER: &str = "X-Oldest-Retained-Id";

/// Event name of the in-band notice sent when a reader falls behind eviction
pub const EVENTS_LOST_EVENT: &str = "events_lost";

/// An event as it travels on the wire
///
/// Decoding yields this rather than [`Event`]: the wire carries no stream ID,
/// and events may be anonymous.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEvent {
    pub id: Option<EventId>,
    pub event_type: Option<String>,
    pub data: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_ms: Option<u64>,
}

impl WireEvent {
    /// Event name, defaulting to `message` as browsers do
    pub fn event_name(&self) -> &str {
        self.event_type.as_deref().unwrap_or("message")
    }

    /// Whether this is the in-band events-lost notice
    ///
    /// The notice is the only block a feed sends without an ID; logged events
    /// always carry one and may not use the reserved name.
    pub fn is_events_lost(&self) -> bool {
        self.id.is_none() && self.event_type.as_deref() == Some(EVENTS_LOST_EVENT)
    }
}

impl From<&Event> for WireEvent {
    fn from(event: &Event) -> Self {
        Self {
            id: Some(event.id),
            event_type: event.event_type.clone(),
            data: event.data.clone(),
            comments: event.comment.iter().cloned().collect(),
            retry_ms: event.retry_ms,
        }
    }
}

/// Payload of the in-band events-lost notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsLostNotice {
    pub oldest_retained_id: EventId,
}

impl EventsLostNotice {
    /// Build the wire block announcing the gap
    pub fn to_wire(self) -> WireEvent {
        WireEvent {
            event_type: Some(EVENTS_LOST_EVENT.to_string()),
            data: serde_json::json!({ "oldest_retained_id": self.oldest_retained_id }).to_string(),
            ..Default::default()
        }
    }

    /// Parse the notice from a decoded wire event
    pub fn from_wire(event: &WireEvent) -> Option<Self> {
        if !event.is_events_lost() {
            return None;
        }
        serde_json::from_str(&event.data).ok()
    }
}
