//! Event Stream - bounded append-only log for one stream
//!
//! The stream hands out strictly increasing [`EventId`]s starting at the
//! origin, keeps at most `capacity` events and evicts FIFO. Reads that would
//! need an evicted event fail with [`StreamError::EventsLost`] instead of
//! silently skipping ahead.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, trace};

use super::stats::StreamStats;
use crate::error::{StreamError, StreamResult};
use crate::protocol::EVENTS_LOST_EVENT;
use crate::types::{Event, EventId, NewEvent, StreamId};

/// Capability contract of an event log
///
/// The in-memory [`InMemoryEventStream`] is the only implementation today; a
/// durable log would slot in behind the same trait.
pub trait EventStream: Send + Sync {
    /// Identifier, constant for the stream's lifetime
    fn stream_id(&self) -> StreamId;

    /// Append an event, assigning the next ID
    ///
    /// Drafts named after a reserved notice are rejected with
    /// [`StreamError::ReservedEventType`].
    fn append(&self, event: NewEvent) -> StreamResult<Arc<Event>>;

    /// Snapshot of events with `id > after` (`None` reads from the origin)
    fn read_after(&self, after: Option<EventId>) -> StreamResult<Vec<Arc<Event>>>;

    /// Snapshot of every event still retained
    fn read_retained(&self) -> StreamResult<Vec<Arc<Event>>>;

    /// ID of the oldest event still held (equals `next_id` while empty)
    fn oldest_retained_id(&self) -> EventId;

    /// ID the next append will receive
    fn next_id(&self) -> EventId;

    /// Watch the head of the stream; the value is `next_id` after each append
    fn subscribe(&self) -> watch::Receiver<EventId>;

    /// Release the stream; later reads and appends fail with `StreamNotFound`
    fn close(&self);

    fn is_closed(&self) -> bool;

    fn stats(&self) -> StreamStats;
}

/// Mutable state, guarded as one unit so readers never see a partial append
#[derive(Debug)]
struct StreamLog {
    events: VecDeque<Arc<Event>>,
    next_id: EventId,
    oldest_retained_id: EventId,
    appended: u64,
    evicted: u64,
    closed: bool,
}

/// In-memory bounded event log
pub struct InMemoryEventStream {
    id: StreamId,
    capacity: usize,
    log: RwLock<StreamLog>,
    head_tx: watch::Sender<EventId>,
}

impl InMemoryEventStream {
    /// Create an empty stream retaining at most `capacity` events (minimum 1)
    pub fn new(id: StreamId, capacity: usize) -> Self {
        let (head_tx, _) = watch::channel(EventId::ORIGIN);
        Self {
            id,
            capacity: capacity.max(1),
            log: RwLock::new(StreamLog {
                events: VecDeque::new(),
                next_id: EventId::ORIGIN,
                oldest_retained_id: EventId::ORIGIN,
                appended: 0,
                evicted: 0,
                closed: false,
            }),
            head_tx,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn not_found(&self) -> StreamError {
        StreamError::StreamNotFound(self.id)
    }
}

impl EventStream for InMemoryEventStream {
    fn stream_id(&self) -> StreamId {
        self.id
    }

    fn append(&self, draft: NewEvent) -> StreamResult<Arc<Event>> {
        if draft.event_type.as_deref() == Some(EVENTS_LOST_EVENT) {
            return Err(StreamError::ReservedEventType(EVENTS_LOST_EVENT.to_string()));
        }

        let mut log = self.log.write();
        if log.closed {
            return Err(self.not_found());
        }

        let id = log.next_id;
        let event = Arc::new(Event::from_draft(self.id, id, draft));
        log.events.push_back(Arc::clone(&event));
        log.next_id = id.next();
        log.appended += 1;

        while log.events.len() > self.capacity {
            if let Some(evicted) = log.events.pop_front() {
                log.evicted += 1;
                trace!(stream_id = %self.id, event_id = %evicted.id, "evicted event");
            }
        }
        log.oldest_retained_id = log.events.front().map_or(log.next_id, |e| e.id);

        // Published under the write lock so observers see heads in order
        self.head_tx.send_replace(log.next_id);
        Ok(event)
    }

    fn read_after(&self, after: Option<EventId>) -> StreamResult<Vec<Arc<Event>>> {
        let log = self.log.read();
        if log.closed {
            return Err(self.not_found());
        }

        let first_needed = match after {
            None => EventId::ORIGIN,
            Some(after) => match after.value().checked_add(1) {
                Some(next) => EventId::new(next),
                None => return Ok(Vec::new()),
            },
        };

        if first_needed < log.oldest_retained_id {
            return Err(StreamError::EventsLost {
                stream_id: self.id,
                oldest_retained_id: log.oldest_retained_id,
            });
        }

        let skip = (first_needed.value() - log.oldest_retained_id.value()) as usize;
        Ok(log.events.iter().skip(skip).cloned().collect())
    }

    fn read_retained(&self) -> StreamResult<Vec<Arc<Event>>> {
        let log = self.log.read();
        if log.closed {
            return Err(self.not_found());
        }
        Ok(log.events.iter().cloned().collect())
    }

    fn oldest_retained_id(&self) -> EventId {
        self.log.read().oldest_retained_id
    }

    fn next_id(&self) -> EventId {
        self.log.read().next_id
    }

    fn subscribe(&self) -> watch::Receiver<EventId> {
        self.head_tx.subscribe()
    }

    fn close(&self) {
        let mut log = self.log.write();
        if log.closed {
            return;
        }
        log.closed = true;
        log.events.clear();
        debug!(stream_id = %self.id, appended = log.appended, "closed stream");
        // Wake long-lived readers so they notice the closure
        self.head_tx.send_modify(|_| {});
    }

    fn is_closed(&self) -> bool {
        self.log.read().closed
    }

    fn stats(&self) -> StreamStats {
        let log = self.log.read();
        StreamStats {
            stream_id: self.id,
            capacity: self.capacity,
            retained: log.events.len(),
            appended: log.appended,
            evicted: log.evicted,
            oldest_retained_id: log.oldest_retained_id,
            next_id: log.next_id,
            closed: log.closed,
        }
    }
}
