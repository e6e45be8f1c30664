//! SSE Streams
//!
//! An in-memory server-sent event engine: bounded, resumable event logs,
//! a periodic emission scheduler, the SSE wire codec, an axum HTTP surface
//! and a client that reconnects with `Last-Event-ID`.
//!
//! # Modules
//!
//! - `types`: Identifiers and events
//! - `event_store`: Bounded per-stream logs and the stream repository
//! - `scheduler`: Periodic producers on a bounded worker pool
//! - `protocol`: `text/event-stream` encoder and incremental decoder
//! - `client`: Reconnecting client and its transports
//! - `api`: HTTP endpoints (stream, redirect, management)
//! - `config`: Server configuration from the environment
//! - `error`: Error types
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sse_streams::client::{ClientConfig, ClientMessage, LocalTransport, ReconnectingClient};
//! use sse_streams::{EventStreamRepository, InMemoryRepository, NewEvent};
//!
//! #[tokio::main]
//! async fn main() {
//!     let repository: Arc<dyn EventStreamRepository> = Arc::new(InMemoryRepository::new(256));
//!     let stream = repository.create();
//!     stream.append(NewEvent::new("hello")).unwrap();
//!
//!     let transport = LocalTransport::new(Arc::clone(&repository), stream.stream_id());
//!     let (handle, mut events) = ReconnectingClient::channel(ClientConfig::default(), transport, 16);
//!     while let Some(message) = events.recv().await {
//!         if let ClientMessage::Event(event) = message {
//!             println!("{}: {}", event.event_name(), event.data);
//!             handle.stop();
//!         }
//!     }
//! }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod event_store;
pub mod protocol;
pub mod scheduler;
pub mod types;

// Re-export commonly used items at crate root
pub use config::ServerConfig;
pub use error::{ClientError, StreamError, StreamResult};
pub use event_store::{EventStream, EventStreamRepository, InMemoryRepository};
pub use scheduler::{EmissionScheduler, Producer};
pub use types::{Event, EventId, NewEvent, StreamId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
