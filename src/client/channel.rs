//! Channel-backed delivery for callers that prefer pulling messages

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{EventHandler, Flow};
use crate::error::ClientError;
use crate::protocol::WireEvent;

/// Something the client observed
#[derive(Debug)]
pub enum ClientMessage {
    /// A connection was established
    Connected,
    Event(WireEvent),
    /// A connection failed or ended; the client may retry
    Error(ClientError),
}

/// Receiving side of [`ReconnectingClient::channel`](super::ReconnectingClient::channel)
///
/// Returns `None` once the client has stopped.
pub struct ClientEvents {
    rx: mpsc::Receiver<ClientMessage>,
    stop: CancellationToken,
}

impl ClientEvents {
    pub(super) fn new(rx: mpsc::Receiver<ClientMessage>, stop: CancellationToken) -> Self {
        Self { rx, stop }
    }

    pub async fn recv(&mut self) -> Option<ClientMessage> {
        tokio::select! {
            biased;
            _ = self.stop.cancelled() => None,
            message = self.rx.recv() => message,
        }
    }
}

pub(super) struct ChannelHandler {
    tx: mpsc::Sender<ClientMessage>,
}

impl ChannelHandler {
    pub(super) fn new(buffer: usize) -> (Self, mpsc::Receiver<ClientMessage>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventHandler for ChannelHandler {
    async fn on_connect(&mut self) {
        let _ = self.tx.send(ClientMessage::Connected).await;
    }

    async fn on_event(&mut self, event: WireEvent) -> Flow {
        match self.tx.send(ClientMessage::Event(event)).await {
            Ok(()) => Flow::Continue,
            // Receiver dropped: nobody is listening any more
            Err(_) => Flow::Stop,
        }
    }

    async fn on_error(&mut self, error: ClientError) {
        let _ = self.tx.send(ClientMessage::Error(error)).await;
    }
}
