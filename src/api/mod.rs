//! HTTP surface of the stream engine
//!
//! SSE stream and redirect endpoints plus REST management of streams.

pub mod http;
pub mod rest;
pub mod sse;
pub mod state;

pub use http::create_router;
pub use state::AppState;
