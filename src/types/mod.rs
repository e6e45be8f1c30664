//! Data types for the SSE stream engine
//!
//! This module contains the identifiers and event records shared by the
//! stream log, the wire codec and the client.

mod event;
mod ids;

pub use event::{Event, NewEvent};
pub use ids::{EventId, StreamId};
