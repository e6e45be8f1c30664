//! SSE endpoints
//!
//! ## Endpoints
//! - `GET /stream/:id` - Event stream; honours `Last-Event-ID`
//! - `GET /redirect/:id` - `302 Found` to `/stream/:id`

mod feed;
pub mod handler;

pub use feed::{Feed, KEEP_ALIVE_COMMENT};
