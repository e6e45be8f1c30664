//! Reconnecting SSE client
//!
//! ```text
//!   Disconnected ──► Connecting ──► Connected
//!        ▲               │              │
//!        └── retry ◄─────┴── error ◄────┘
//!                                        stop() / Flow::Stop / fatal ──► Stopped
//! ```
//!
//! Every (re)connection presents the ID of the last event the handler fully
//! processed, so events are delivered in order and never twice. When the
//! server reports that the resume point was evicted the client forgets it and
//! starts again from the retained history.

mod channel;
mod transport;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::DEFAULT_KEEP_ALIVE;
use crate::error::{ClientError, ClientResult};
use crate::protocol::{Decoder, EventsLostNotice, WireEvent};
use crate::types::EventId;

pub use channel::{ClientEvents, ClientMessage};
pub use transport::{ByteStream, HttpTransport, LocalTransport, Transport, MAX_REDIRECTS};

/// Reconnect delay used until the server sends a `retry` field
pub const DEFAULT_RETRY: Duration = Duration::from_secs(3);

/// Silence after which a connection is presumed dead
///
/// Three times the server's default keep-alive interval, so a half-open
/// connection is noticed while a healthy idle one never trips it.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(3 * DEFAULT_KEEP_ALIVE.as_secs());

/// Client tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Delay between connection attempts unless overridden by the server
    pub default_retry: Duration,
    /// Treat a connection as dead after this long without bytes
    ///
    /// Defaults to [`DEFAULT_STALL_TIMEOUT`]; keep it above the server's
    /// keep-alive interval. `None` waits forever.
    pub stall_timeout: Option<Duration>,
    /// Give up after this many consecutive failed connection attempts
    pub max_attempts: Option<u32>,
    /// Resume token presented on the first connection
    pub last_event_id: Option<EventId>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_retry: DEFAULT_RETRY,
            stall_timeout: Some(DEFAULT_STALL_TIMEOUT),
            max_attempts: None,
            last_event_id: None,
        }
    }
}

impl ClientConfig {
    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.default_retry = retry;
        self
    }

    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = Some(timeout);
        self
    }

    /// Never treat a silent connection as stalled
    pub fn without_stall_timeout(mut self) -> Self {
        self.stall_timeout = None;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn resume_after(mut self, id: EventId) -> Self {
        self.last_event_id = Some(id);
        self
    }
}

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Connected,
    Stopped,
}

/// Handler verdict after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Callbacks driven by the client task
///
/// Calls are sequential: `on_event` for one event returns before the next
/// event is decoded, and the event counts as seen only once it returns.
/// A callback still pending when the client is stopped is dropped.
#[async_trait]
pub trait EventHandler: Send + 'static {
    async fn on_connect(&mut self) {}

    async fn on_event(&mut self, event: WireEvent) -> Flow;

    async fn on_error(&mut self, _error: ClientError) {}

    async fn on_stopped(&mut self) {}
}

/// Control side of a running client
pub struct ClientHandle {
    stop: CancellationToken,
    state: watch::Receiver<ClientState>,
    last_seen: Arc<Mutex<Option<EventId>>>,
    task: JoinHandle<()>,
}

impl ClientHandle {
    /// Request a stop; idempotent
    ///
    /// The open connection is dropped and no further events are delivered.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn state(&self) -> ClientState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn state_changes(&self) -> watch::Receiver<ClientState> {
        self.state.clone()
    }

    /// ID of the last event the handler fully processed
    pub fn last_seen_id(&self) -> Option<EventId> {
        *self.last_seen.lock()
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == ClientState::Stopped
    }

    /// Wait for the client task to finish
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "client task failed");
        }
    }
}

/// Entry points for running a client
pub struct ReconnectingClient;

impl ReconnectingClient {
    /// Run a client on the current runtime, delivering to `handler`
    pub fn spawn<T, H>(config: ClientConfig, transport: T, handler: H) -> ClientHandle
    where
        T: Transport + 'static,
        H: EventHandler,
    {
        let stop = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(ClientState::Disconnected);
        let last_seen = Arc::new(Mutex::new(config.last_event_id));

        let driver = Driver {
            retry: config.default_retry,
            config,
            transport,
            handler,
            stop: stop.clone(),
            state: state_tx,
            last_seen: Arc::clone(&last_seen),
            failures: 0,
        };
        let task = tokio::spawn(driver.run());

        ClientHandle {
            stop,
            state: state_rx,
            last_seen,
            task,
        }
    }

    /// Run a client delivering into a bounded channel
    ///
    /// A slow consumer applies backpressure to the connection.
    pub fn channel<T>(
        config: ClientConfig,
        transport: T,
        buffer: usize,
    ) -> (ClientHandle, ClientEvents)
    where
        T: Transport + 'static,
    {
        let (handler, rx) = channel::ChannelHandler::new(buffer);
        let handle = Self::spawn(config, transport, handler);
        let events = ClientEvents::new(rx, handle.stop.clone());
        (handle, events)
    }
}

/// How a connection ended
enum Outcome {
    Stopped,
    Failed(ClientError),
}

struct Driver<T, H> {
    config: ClientConfig,
    transport: T,
    handler: H,
    stop: CancellationToken,
    state: watch::Sender<ClientState>,
    last_seen: Arc<Mutex<Option<EventId>>>,
    retry: Duration,
    failures: u32,
}

impl<T: Transport, H: EventHandler> Driver<T, H> {
    async fn run(mut self) {
        loop {
            if self.stop.is_cancelled() {
                break;
            }

            self.set_state(ClientState::Connecting);
            let last_event_id = self.last_seen_id();
            let opened = tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                opened = connect(&self.transport, last_event_id, self.failures + 1) => opened,
            };

            let outcome = match opened {
                Ok(body) => {
                    self.failures = 0;
                    self.set_state(ClientState::Connected);
                    tokio::select! {
                        biased;
                        _ = self.stop.cancelled() => break,
                        _ = self.handler.on_connect() => {}
                    }
                    self.consume(body).await
                }
                Err(e) => {
                    self.failures += 1;
                    Outcome::Failed(e)
                }
            };

            let error = match outcome {
                Outcome::Stopped => break,
                Outcome::Failed(_) if self.stop.is_cancelled() => break,
                Outcome::Failed(error) => error,
            };

            self.set_state(ClientState::Disconnected);
            let recoverable = error.is_recoverable();
            if let ClientError::EventsLost { oldest_retained_id } = &error {
                warn!(
                    last_seen = ?self.last_seen_id(),
                    oldest_retained_id = ?oldest_retained_id,
                    "resume point evicted, restarting from retained history"
                );
                *self.last_seen.lock() = None;
            } else {
                debug!(error = %error, recoverable, "connection ended");
            }
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                _ = self.handler.on_error(error) => {}
            }

            if !recoverable {
                break;
            }
            if let Some(max) = self.config.max_attempts {
                if self.failures >= max {
                    warn!(attempts = self.failures, "giving up on reconnecting");
                    let exhausted = ClientError::ReconnectExhausted {
                        attempts: self.failures,
                    };
                    tokio::select! {
                        biased;
                        _ = self.stop.cancelled() => {}
                        _ = self.handler.on_error(exhausted) => {}
                    }
                    break;
                }
            }

            tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                _ = tokio::time::sleep(self.retry) => {}
            }
        }

        self.set_state(ClientState::Stopped);
        self.handler.on_stopped().await;
        info!(last_seen = ?self.last_seen_id(), "client stopped");
    }

    /// Read one connection until it ends, fails or the client stops
    async fn consume(&mut self, mut body: ByteStream) -> Outcome {
        let mut decoder = Decoder::new();

        loop {
            let chunk = tokio::select! {
                biased;
                _ = self.stop.cancelled() => return Outcome::Stopped,
                chunk = next_chunk(&mut body, self.config.stall_timeout) => chunk,
            };

            let bytes = match chunk {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    decoder.finish();
                    return Outcome::Failed(ClientError::Closed);
                }
                Err(e) => return Outcome::Failed(e),
            };

            let events = decoder.feed(&bytes);
            if let Some(retry) = decoder.retry() {
                self.retry = retry;
            }

            for event in events {
                if self.stop.is_cancelled() {
                    return Outcome::Stopped;
                }
                if let Some(notice) = EventsLostNotice::from_wire(&event) {
                    return Outcome::Failed(ClientError::EventsLost {
                        oldest_retained_id: Some(notice.oldest_retained_id),
                    });
                }

                let id = event.id;
                if let (Some(id), Some(last)) = (id, self.last_seen_id()) {
                    if id <= last {
                        debug!(%id, %last, "skipping already seen event");
                        continue;
                    }
                }

                // A handler blocked on a slow consumer must not outlive stop()
                let flow = tokio::select! {
                    biased;
                    _ = self.stop.cancelled() => return Outcome::Stopped,
                    flow = self.handler.on_event(event) => flow,
                };
                if let Some(id) = id {
                    *self.last_seen.lock() = Some(id);
                }
                if flow == Flow::Stop {
                    self.stop.cancel();
                    return Outcome::Stopped;
                }
            }
        }
    }

    fn last_seen_id(&self) -> Option<EventId> {
        *self.last_seen.lock()
    }

    fn set_state(&self, state: ClientState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            debug!(from = ?*current, to = ?state, "client state");
            *current = state;
            true
        });
    }
}

#[instrument(skip(transport))]
async fn connect<T: Transport>(
    transport: &T,
    last_event_id: Option<EventId>,
    attempt: u32,
) -> ClientResult<ByteStream> {
    debug!("connecting");
    transport.open(last_event_id).await
}

/// Next body chunk, failing with `Stalled` after `stall_timeout` of silence
async fn next_chunk(
    body: &mut ByteStream,
    stall_timeout: Option<Duration>,
) -> ClientResult<Option<bytes::Bytes>> {
    let next = match stall_timeout {
        Some(limit) => tokio::time::timeout(limit, body.next())
            .await
            .map_err(|_| ClientError::Stalled(limit))?,
        None => body.next().await,
    };
    next.transpose()
}
