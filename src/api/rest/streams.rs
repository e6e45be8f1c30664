//! Stream management endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{parse_stream_id, ApiError};
use crate::api::state::AppState;
use crate::event_store::RepositoryStats;
use crate::scheduler::{Heartbeat, SchedulerStats};
use crate::types::{EventId, NewEvent, StreamId};

/// Body of `POST /streams`
#[derive(Debug, Default, Deserialize)]
pub struct CreateStreamRequest {
    /// Attach a heartbeat producer to the new stream
    #[serde(default)]
    pub heartbeat: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateStreamResponse {
    pub stream_id: StreamId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListStreamsResponse {
    pub streams: Vec<StreamId>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AppendEventResponse {
    pub id: EventId,
}

/// Body of `GET /stats`
#[derive(Debug, Serialize)]
pub struct ServerStats {
    pub streams: RepositoryStats,
    pub scheduler: SchedulerStats,
}

/// POST /streams - Create a stream
pub async fn create_stream(
    State(state): State<Arc<AppState>>,
    body: Option<Json<CreateStreamRequest>>,
) -> impl IntoResponse {
    let request = body.map(|Json(req)| req).unwrap_or_default();
    let stream = state.repository.create();
    let stream_id = stream.stream_id();

    if request.heartbeat {
        if let Err(e) = state.scheduler.schedule(stream_id, Arc::new(Heartbeat)) {
            warn!(stream_id = %stream_id, error = %e, "could not schedule heartbeat");
            state.repository.delete(&stream_id);
            return ApiError::internal(e.to_string()).into_response();
        }
    }

    info!(stream_id = %stream_id, heartbeat = request.heartbeat, "stream created via api");
    (StatusCode::CREATED, Json(CreateStreamResponse { stream_id })).into_response()
}

/// GET /streams - List live stream IDs
pub async fn list_streams(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let streams = state.repository.stream_ids();
    let total = streams.len();
    Json(ListStreamsResponse { streams, total })
}

/// GET /streams/:id - Stream statistics
pub async fn get_stream(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> impl IntoResponse {
    let stream_id = match parse_stream_id(&raw_id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };

    match state.repository.get(&stream_id) {
        Some(stream) => Json(stream.stats()).into_response(),
        None => ApiError::not_found(format!("stream {stream_id} not found")).into_response(),
    }
}

/// DELETE /streams/:id - Delete a stream; deleting twice is not an error
pub async fn delete_stream(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> impl IntoResponse {
    let stream_id = match parse_stream_id(&raw_id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };

    state.repository.delete(&stream_id);
    StatusCode::NO_CONTENT.into_response()
}

/// POST /streams/:id/events - Append an event
pub async fn append_event(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    Json(draft): Json<NewEvent>,
) -> impl IntoResponse {
    let stream_id = match parse_stream_id(&raw_id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };

    let Some(stream) = state.repository.get(&stream_id) else {
        return ApiError::not_found(format!("stream {stream_id} not found")).into_response();
    };

    match stream.append(draft) {
        Ok(event) => (
            StatusCode::CREATED,
            Json(AppendEventResponse { id: event.id }),
        )
            .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// GET /stats - Aggregate repository and scheduler counters
pub async fn server_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ServerStats {
        streams: RepositoryStats::collect(state.repository.as_ref()),
        scheduler: state.scheduler.stats(),
    })
}
