//! Stream and redirect endpoints

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use tracing::{debug, info};

use super::feed::Feed;
use crate::api::rest::{parse_stream_id, ApiError};
use crate::api::state::AppState;
use crate::protocol::{CONTENT_TYPE, LAST_EVENT_ID_HEADER};
use crate::types::EventId;

/// Read the resume token; an empty header counts as absent
fn resume_token(headers: &HeaderMap) -> Result<Option<EventId>, ApiError> {
    let Some(value) = headers.get(LAST_EVENT_ID_HEADER) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| ApiError::bad_request("Last-Event-ID is not valid text"))?;
    if raw.trim().is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|_| ApiError::bad_request(format!("malformed Last-Event-ID: {raw}")))
}

/// GET /stream/:id - Event stream, resumable with `Last-Event-ID`
pub async fn stream_handler(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let stream_id = match parse_stream_id(&raw_id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    let last_event_id = match resume_token(&headers) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };

    let Some(stream) = state.repository.get(&stream_id) else {
        return ApiError::not_found(format!("stream {stream_id} not found")).into_response();
    };

    let feed = match Feed::open(stream, last_event_id, state.keep_alive) {
        Ok(feed) => feed,
        Err(e) => {
            debug!(stream_id = %stream_id, last_event_id = ?last_event_id, error = %e, "rejecting stream request");
            return ApiError::from(e).into_response();
        }
    };

    info!(
        stream_id = %stream_id,
        last_event_id = ?last_event_id,
        backlog = feed.backlog_len(),
        "client connected"
    );

    let body = Body::from_stream(feed.into_stream().map(Ok::<_, Infallible>));
    (
        [
            (header::CONTENT_TYPE, CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

/// GET /redirect/:id - Point the client at the stream endpoint
pub async fn redirect_handler(Path(raw_id): Path<String>) -> Response {
    match parse_stream_id(&raw_id) {
        Ok(stream_id) => (
            StatusCode::FOUND,
            [(header::LOCATION, format!("/stream/{stream_id}"))],
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_resume_token_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(resume_token(&headers).unwrap(), None);

        headers.insert(LAST_EVENT_ID_HEADER, HeaderValue::from_static("42"));
        assert_eq!(resume_token(&headers).unwrap(), Some(EventId::new(42)));

        headers.insert(LAST_EVENT_ID_HEADER, HeaderValue::from_static(""));
        assert_eq!(resume_token(&headers).unwrap(), None);

        headers.insert(LAST_EVENT_ID_HEADER, HeaderValue::from_static("abc"));
        let err = resume_token(&headers).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
