//! Byte transports the reconnecting client reads from

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{redirect, StatusCode};
use tracing::debug;

use crate::api::sse::Feed;
use crate::config::DEFAULT_KEEP_ALIVE;
use crate::error::{ClientError, ClientResult};
use crate::event_store::EventStreamRepository;
use crate::protocol::{CONTENT_TYPE, LAST_EVENT_ID_HEADER, OLDEST_RETAINED_HEADER};
use crate::types::{EventId, StreamId};

/// Raw response body of one connection
pub type ByteStream = Pin<Box<dyn Stream<Item = ClientResult<Bytes>> + Send>>;

/// Redirect hops followed before giving up
pub const MAX_REDIRECTS: usize = 10;

/// Opens one SSE connection, resuming after `last_event_id` when given
///
/// Status-level failures map to [`ClientError`] before any body is read;
/// the stream ending means the server closed the connection.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, last_event_id: Option<EventId>) -> ClientResult<ByteStream>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn open(&self, last_event_id: Option<EventId>) -> ClientResult<ByteStream> {
        (**self).open(last_event_id).await
    }
}

/// HTTP transport over reqwest
///
/// Redirects are followed with the original headers, so `Last-Event-ID`
/// survives a hop through `/redirect/:id`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self::with_client(url, client))
    }

    /// Use a preconfigured client (proxies, TLS roots, ...)
    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, last_event_id: Option<EventId>) -> ClientResult<ByteStream> {
        let mut request = self
            .client
            .get(&self.url)
            .header(ACCEPT, CONTENT_TYPE)
            .header(CACHE_CONTROL, "no-cache");
        if let Some(id) = last_event_id {
            request = request.header(LAST_EVENT_ID_HEADER, id.to_string());
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(url = %self.url, final_url = %response.url(), %status, "sse response");

        match status {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => return Err(ClientError::StreamNotFound),
            StatusCode::GONE => {
                let oldest_retained_id = response
                    .headers()
                    .get(OLDEST_RETAINED_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok());
                return Err(ClientError::EventsLost { oldest_retained_id });
            }
            s => return Err(ClientError::UnexpectedStatus(s.as_u16())),
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ClientError::from));
        Ok(Box::pin(body))
    }
}

/// In-process transport reading straight from a repository
///
/// Produces the same bytes the HTTP endpoint would, without a socket.
#[derive(Clone)]
pub struct LocalTransport {
    repository: Arc<dyn EventStreamRepository>,
    stream_id: StreamId,
    keep_alive: Duration,
}

impl LocalTransport {
    pub fn new(repository: Arc<dyn EventStreamRepository>, stream_id: StreamId) -> Self {
        Self {
            repository,
            stream_id,
            keep_alive: DEFAULT_KEEP_ALIVE,
        }
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn open(&self, last_event_id: Option<EventId>) -> ClientResult<ByteStream> {
        let stream = self
            .repository
            .get(&self.stream_id)
            .ok_or(ClientError::StreamNotFound)?;
        let feed = Feed::open(stream, last_event_id, self.keep_alive)?;
        Ok(Box::pin(
            feed.into_stream().map(|block| Ok(Bytes::from(block))),
        ))
    }
}
