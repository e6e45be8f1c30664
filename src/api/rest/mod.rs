//! REST endpoints for managing streams
//!
//! - `POST /streams` - Create a stream, optionally with a heartbeat producer
//! - `GET /streams` - List live stream IDs
//! - `GET /streams/:id` - Stream statistics
//! - `DELETE /streams/:id` - Delete a stream (idempotent)
//! - `POST /streams/:id/events` - Append an event

pub mod streams;

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::StreamError;
use crate::protocol::OLDEST_RETAINED_HEADER;
use crate::types::{EventId, StreamId};

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
    #[serde(skip)]
    status: StatusCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_retained_id: Option<EventId>,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: code.to_string(),
            status,
            oldest_retained_id: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    /// The requested resume point has been evicted
    pub fn events_lost(oldest_retained_id: EventId) -> Self {
        Self {
            oldest_retained_id: Some(oldest_retained_id),
            ..Self::new(
                StatusCode::GONE,
                "EVENTS_LOST",
                format!("events lost, oldest retained event is {oldest_retained_id}"),
            )
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<StreamError> for ApiError {
    fn from(e: StreamError) -> Self {
        match e {
            StreamError::StreamNotFound(id) => Self::not_found(format!("stream {id} not found")),
            StreamError::EventsLost {
                oldest_retained_id, ..
            } => Self::events_lost(oldest_retained_id),
            e @ StreamError::ReservedEventType(_) => Self::bad_request(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        let oldest = self.oldest_retained_id;
        let mut response = (status, Json(self)).into_response();
        if let Some(id) = oldest {
            if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
                response.headers_mut().insert(OLDEST_RETAINED_HEADER, value);
            }
        }
        response
    }
}

/// Parse a stream ID path segment
pub(crate) fn parse_stream_id(raw: &str) -> Result<StreamId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("invalid stream id: {raw}")))
}
