//! Event Store Module
//!
//! This module provides the in-memory event log behind every SSE stream:
//! - `EventStream`: bounded append-only log with gap signaling
//! - `EventStreamRepository`: registry owning stream lifecycles
//! - `StreamStats`: per-stream and aggregate statistics
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//! ┌───────────┐    ┌──────────────┐    ┌────────────────┐    ┌─────────────┐
//! │ Scheduler │───►│ append()     │───►│ evict oldest   │───►│ notify head │
//! │ / API     │    │ assign id    │    │ past capacity  │    │ watchers    │
//! └───────────┘    └──────────────┘    └────────────────┘    └─────────────┘
//!
//! Read Path (resume):
//! ┌────────────────┐    ┌───────────────────┐    ┌──────────────────────┐
//! │ Last-Event-ID  │───►│ read_after(last)  │───►│ events or EventsLost │
//! └────────────────┘    └───────────────────┘    └──────────────────────┘
//! ```

mod repository;
mod stats;
mod stream;

pub use repository::{EventStreamRepository, InMemoryRepository};
pub use stats::{RepositoryStats, StreamStats};
pub use stream::{EventStream, InMemoryEventStream};
