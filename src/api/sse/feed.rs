//! Rendering of one stream as an unbounded sequence of SSE blocks
//!
//! A feed starts at the client's resume token: `read_after(last_event_id)`
//! when a token is given, otherwise everything still retained. It then
//! suspends on the stream's head watch, emitting keep-alive comments while
//! idle, until the stream is deleted or the consumer goes away. Every live
//! read continues from the last ID sent, so a gap is always announced.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{StreamError, StreamResult};
use crate::event_store::EventStream;
use crate::protocol::{encode, encode_comment, encode_wire, EventsLostNotice};
use crate::types::{Event, EventId};

/// Comment text of idle keep-alive blocks
pub const KEEP_ALIVE_COMMENT: &str = "keep-alive";

/// A resolved, ready-to-stream view of one event stream
pub struct Feed {
    stream: Arc<dyn EventStream>,
    head: watch::Receiver<EventId>,
    backlog: Vec<Arc<Event>>,
    cursor: Option<EventId>,
    keep_alive: Duration,
}

enum Wake {
    Changed,
    KeepAlive,
    Closed,
}

impl Feed {
    /// Resolve the resume point
    ///
    /// Fails before any byte is produced when the stream is gone or the
    /// token predates retained history, so callers can answer with a status.
    pub fn open(
        stream: Arc<dyn EventStream>,
        last_event_id: Option<EventId>,
        keep_alive: Duration,
    ) -> StreamResult<Self> {
        // Subscribe before reading so no append between the two is missed
        let mut head = stream.subscribe();
        let next_id = *head.borrow_and_update();

        let (backlog, cursor) = match last_event_id {
            Some(id) => (stream.read_after(Some(id))?, Some(id)),
            // Live reads continue from the head seen here, so evictions
            // before the first poll are still reported
            None => (stream.read_retained()?, next_id.prev()),
        };

        Ok(Self {
            stream,
            head,
            backlog,
            cursor,
            keep_alive,
        })
    }

    /// Number of events replayed before live tailing starts
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Turn the feed into a stream of encoded SSE blocks
    pub fn into_stream(self) -> impl Stream<Item = String> + Send + 'static {
        let Feed {
            stream,
            mut head,
            backlog,
            mut cursor,
            keep_alive,
        } = self;
        let stream_id = stream.stream_id();

        async_stream::stream! {
            for event in backlog {
                cursor = Some(event.id);
                if let Some(block) = encode_or_skip(&event) {
                    yield block;
                }
            }

            loop {
                let wake = tokio::select! {
                    changed = head.changed() => match changed {
                        Ok(()) => Wake::Changed,
                        Err(_) => Wake::Closed,
                    },
                    _ = tokio::time::sleep(keep_alive) => Wake::KeepAlive,
                };

                match wake {
                    Wake::KeepAlive => {
                        yield encode_comment(KEEP_ALIVE_COMMENT);
                        continue;
                    }
                    Wake::Closed => break,
                    Wake::Changed => {}
                }

                head.borrow_and_update();
                match stream.read_after(cursor) {
                    Ok(events) => {
                        for event in events {
                            cursor = Some(event.id);
                            if let Some(block) = encode_or_skip(&event) {
                                yield block;
                            }
                        }
                    }
                    Err(StreamError::EventsLost { oldest_retained_id, .. }) => {
                        warn!(
                            stream_id = %stream_id,
                            cursor = ?cursor,
                            oldest_retained_id = %oldest_retained_id,
                            "reader fell behind eviction"
                        );
                        let notice = EventsLostNotice { oldest_retained_id }.to_wire();
                        if let Ok(block) = encode_wire(&notice) {
                            yield block;
                        }
                        break;
                    }
                    Err(e) => {
                        debug!(stream_id = %stream_id, error = %e, "stream closed, ending feed");
                        break;
                    }
                }
            }
        }
    }
}

/// Encode an event, logging and skipping it when it cannot be encoded
fn encode_or_skip(event: &Event) -> Option<String> {
    match encode(event) {
        Ok(block) => Some(block),
        Err(e) => {
            warn!(
                stream_id = %event.stream_id,
                event_id = %event.id,
                error = %e,
                "skipping unencodable event"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::{EventStreamRepository, InMemoryRepository};
    use crate::protocol::Decoder;
    use crate::types::NewEvent;
    use futures::StreamExt;

    const IDLE: Duration = Duration::from_secs(30);

    #[tokio::test]
    async fn test_resumes_after_token() {
        let repo = InMemoryRepository::new(16);
        let stream = repo.create();
        for i in 0..4 {
            stream.append(NewEvent::new(i.to_string())).unwrap();
        }

        let feed = Feed::open(Arc::clone(&stream), Some(EventId::new(1)), IDLE).unwrap();
        assert_eq!(feed.backlog_len(), 2);

        let blocks: Vec<String> = feed.into_stream().take(2).collect().await;
        assert_eq!(blocks, vec!["id: 2\ndata: 2\n\n", "id: 3\ndata: 3\n\n"]);
    }

    #[tokio::test]
    async fn test_tails_new_events() {
        let repo = InMemoryRepository::new(16);
        let stream = repo.create();
        let feed = Feed::open(Arc::clone(&stream), None, IDLE).unwrap();
        let mut blocks = Box::pin(feed.into_stream());

        stream.append(NewEvent::new("live")).unwrap();
        assert_eq!(blocks.next().await.unwrap(), "id: 0\ndata: live\n\n");

        stream.append(NewEvent::new("again")).unwrap();
        assert_eq!(blocks.next().await.unwrap(), "id: 1\ndata: again\n\n");
    }

    #[tokio::test]
    async fn test_evicted_token_fails_up_front() {
        let repo = InMemoryRepository::new(2);
        let stream = repo.create();
        for i in 0..5 {
            stream.append(NewEvent::new(i.to_string())).unwrap();
        }

        let err = Feed::open(Arc::clone(&stream), Some(EventId::new(0)), IDLE).err().unwrap();
        assert!(matches!(err, StreamError::EventsLost { oldest_retained_id, .. } if oldest_retained_id == EventId::new(3)));

        // Without a token the retained history is served
        let feed = Feed::open(stream, None, IDLE).unwrap();
        assert_eq!(feed.backlog_len(), 2);
    }

    #[tokio::test]
    async fn test_deleting_stream_ends_feed() {
        let repo = InMemoryRepository::new(16);
        let stream = repo.create();
        stream.append(NewEvent::new("last")).unwrap();

        let feed = Feed::open(Arc::clone(&stream), None, IDLE).unwrap();
        let mut blocks = Box::pin(feed.into_stream());
        assert!(blocks.next().await.is_some());

        repo.delete(&stream.stream_id());
        assert!(blocks.next().await.is_none());
    }

    #[tokio::test]
    async fn test_slow_reader_gets_events_lost_notice() {
        let repo = InMemoryRepository::new(2);
        let stream = repo.create();
        stream.append(NewEvent::new("first")).unwrap();

        let feed = Feed::open(Arc::clone(&stream), None, IDLE).unwrap();
        let mut blocks = Box::pin(feed.into_stream());
        assert_eq!(blocks.next().await.unwrap(), "id: 0\ndata: first\n\n");

        // Overrun the reader before it polls again
        for i in 0..5 {
            stream.append(NewEvent::new(i.to_string())).unwrap();
        }

        let block = blocks.next().await.unwrap();
        let decoded = Decoder::new().feed(block.as_bytes());
        let notice = EventsLostNotice::from_wire(&decoded[0]).unwrap();
        assert_eq!(notice.oldest_retained_id, EventId::new(4));
        assert!(blocks.next().await.is_none());
    }

    #[tokio::test]
    async fn test_eviction_before_first_poll_is_announced() {
        let repo = InMemoryRepository::new(2);
        let stream = repo.create();
        let feed = Feed::open(Arc::clone(&stream), None, IDLE).unwrap();
        assert_eq!(feed.backlog_len(), 0);
        let mut blocks = Box::pin(feed.into_stream());

        for i in 0..5 {
            stream.append(NewEvent::new(i.to_string())).unwrap();
        }

        let block = blocks.next().await.unwrap();
        let decoded = Decoder::new().feed(block.as_bytes());
        let notice = EventsLostNotice::from_wire(&decoded[0]).unwrap();
        assert_eq!(notice.oldest_retained_id, EventId::new(3));
        assert!(blocks.next().await.is_none());
    }

    #[tokio::test]
    async fn test_retained_start_continues_without_gaps() {
        let repo = InMemoryRepository::new(4);
        let stream = repo.create();
        for i in 0..6 {
            stream.append(NewEvent::new(i.to_string())).unwrap();
        }

        // Retained 2..=5 are replayed, then tailing resumes after 5
        let feed = Feed::open(Arc::clone(&stream), None, IDLE).unwrap();
        let mut blocks = Box::pin(feed.into_stream());
        for expected in 2..6 {
            assert_eq!(blocks.next().await.unwrap(), format!("id: {expected}\ndata: {expected}\n\n"));
        }
        stream.append(NewEvent::new("6")).unwrap();
        assert_eq!(blocks.next().await.unwrap(), "id: 6\ndata: 6\n\n");
    }

    #[tokio::test]
    async fn test_idle_feed_sends_keep_alive() {
        let repo = InMemoryRepository::new(4);
        let stream = repo.create();
        let feed = Feed::open(stream, None, Duration::from_millis(10)).unwrap();
        let mut blocks = Box::pin(feed.into_stream());
        assert_eq!(blocks.next().await.unwrap(), ": keep-alive\n\n");
    }

    #[tokio::test]
    async fn test_unencodable_event_is_skipped() {
        let repo = InMemoryRepository::new(4);
        let stream = repo.create();
        stream.append(NewEvent::new("bad").with_type("a\nb")).unwrap();
        stream.append(NewEvent::new("good")).unwrap();

        let feed = Feed::open(stream, None, IDLE).unwrap();
        let mut blocks = Box::pin(feed.into_stream());
        assert_eq!(blocks.next().await.unwrap(), "id: 1\ndata: good\n\n");
    }
}
