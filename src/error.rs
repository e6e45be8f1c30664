//! Error types
//!
//! One enum per concern: the stream log, the wire encoder, the reconnecting
//! client, the scheduler and configuration loading.

use std::time::Duration;

use thiserror::Error;

use crate::types::{EventId, StreamId};

/// Result type for stream log operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors raised by event streams and the repository
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The stream was never created or has been deleted
    #[error("stream {0} not found")]
    StreamNotFound(StreamId),

    /// The requested resume point predates retained history
    #[error("events lost on stream {stream_id}: oldest retained event is {oldest_retained_id}")]
    EventsLost {
        stream_id: StreamId,
        oldest_retained_id: EventId,
    },

    /// The event name is reserved for server-generated notices
    #[error("event type {0:?} is reserved")]
    ReservedEventType(String),
}

/// Errors raised while encoding an event to the wire format
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Event names are single-line and may not contain NUL
    #[error("event type {0:?} contains a line break or NUL")]
    InvalidEventType(String),
}

/// Errors surfaced by the reconnecting client
#[derive(Debug, Error)]
pub enum ClientError {
    /// Low-level I/O or protocol failure
    #[error("transport error: {0}")]
    Transport(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// No bytes (not even a keep-alive) arrived within the stall timeout
    #[error("stream stalled: no data for {0:?}")]
    Stalled(Duration),

    /// The server ended the response
    #[error("stream closed by server")]
    Closed,

    #[error("stream not found")]
    StreamNotFound,

    /// The resume point has been evicted; the client restarts without a token
    #[error("events lost: oldest retained event is {oldest_retained_id:?}")]
    EventsLost { oldest_retained_id: Option<EventId> },

    #[error("unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    #[error("gave up after {attempts} consecutive failed connection attempts")]
    ReconnectExhausted { attempts: u32 },
}

impl ClientError {
    /// Whether the client should try to reconnect after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            ClientError::Transport(_)
            | ClientError::Http(_)
            | ClientError::Stalled(_)
            | ClientError::Closed
            | ClientError::EventsLost { .. } => true,
            // Transient server-side failures are worth another attempt
            ClientError::UnexpectedStatus(status) => *status >= 500,
            ClientError::StreamNotFound | ClientError::ReconnectExhausted { .. } => false,
        }
    }
}

impl From<StreamError> for ClientError {
    fn from(e: StreamError) -> Self {
        match e {
            StreamError::StreamNotFound(_) => ClientError::StreamNotFound,
            StreamError::EventsLost {
                oldest_retained_id, ..
            } => ClientError::EventsLost {
                oldest_retained_id: Some(oldest_retained_id),
            },
        }
    }
}

/// Errors raised by the emission scheduler
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("scheduler has been shut down")]
    ShutDown,

    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// Errors raised while loading configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_error_maps_to_client_error() {
        let lost = StreamError::EventsLost {
            stream_id: StreamId::generate(),
            oldest_retained_id: EventId::new(4),
        };
        assert!(matches!(
            ClientError::from(lost),
            ClientError::EventsLost { oldest_retained_id: Some(id) } if id == EventId::new(4)
        ));

        let missing = StreamError::StreamNotFound(StreamId::generate());
        assert!(matches!(ClientError::from(missing), ClientError::StreamNotFound));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(ClientError::Closed.is_recoverable());
        assert!(ClientError::Stalled(Duration::from_secs(1)).is_recoverable());
        assert!(ClientError::UnexpectedStatus(503).is_recoverable());
        assert!(!ClientError::UnexpectedStatus(401).is_recoverable());
        assert!(!ClientError::StreamNotFound.is_recoverable());
    }

    #[test]
    fn test_error_messages() {
        let err = StreamError::EventsLost {
            stream_id: StreamId::generate(),
            oldest_retained_id: EventId::new(9),
        };
        assert!(err.to_string().contains("oldest retained event is 9"));
    }
}
