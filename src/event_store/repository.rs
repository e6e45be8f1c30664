//! Event Stream Repository - registry of live streams
//!
//! Owns the mapping `StreamId -> EventStream`. A stream is registered fully
//! built, so no reader observes a half-constructed stream, and deleting a
//! stream closes it so that new reads through lingering handles fail.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::stream::{EventStream, InMemoryEventStream};
use crate::error::{StreamError, StreamResult};
use crate::types::{Event, EventId, StreamId};

/// Capability contract of a stream registry
pub trait EventStreamRepository: Send + Sync {
    /// Register a new empty stream with the default capacity
    fn create(&self) -> Arc<dyn EventStream>;

    /// Register a new empty stream retaining at most `capacity` events
    fn create_with_capacity(&self, capacity: usize) -> Arc<dyn EventStream>;

    /// Look up a live stream
    fn get(&self, id: &StreamId) -> Option<Arc<dyn EventStream>>;

    /// Remove and close a stream; returns whether it was live
    fn delete(&self, id: &StreamId) -> bool;

    /// IDs of all live streams
    fn stream_ids(&self) -> Vec<StreamId>;

    /// Number of live streams
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read from a stream by ID, failing with `StreamNotFound` when absent
    fn read_after(&self, id: &StreamId, after: Option<EventId>) -> StreamResult<Vec<Arc<Event>>> {
        self.get(id)
            .ok_or(StreamError::StreamNotFound(*id))?
            .read_after(after)
    }
}

/// Process-scoped in-memory repository
pub struct InMemoryRepository {
    default_capacity: usize,
    streams: RwLock<HashMap<StreamId, Arc<InMemoryEventStream>>>,
}

impl InMemoryRepository {
    /// Create a repository whose streams retain `default_capacity` events
    pub fn new(default_capacity: usize) -> Self {
        Self {
            default_capacity: default_capacity.max(1),
            streams: RwLock::new(HashMap::new()),
        }
    }

    pub fn default_capacity(&self) -> usize {
        self.default_capacity
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_STREAM_CAPACITY)
    }
}

impl EventStreamRepository for InMemoryRepository {
    fn create(&self) -> Arc<dyn EventStream> {
        self.create_with_capacity(self.default_capacity)
    }

    fn create_with_capacity(&self, capacity: usize) -> Arc<dyn EventStream> {
        let mut streams = self.streams.write();
        // UUIDv7 collisions are not expected; regenerate rather than overwrite
        let mut id = StreamId::generate();
        while streams.contains_key(&id) {
            id = StreamId::generate();
        }

        let stream = Arc::new(InMemoryEventStream::new(id, capacity));
        streams.insert(id, Arc::clone(&stream));
        info!(stream_id = %id, capacity = stream.capacity(), "created stream");
        stream
    }

    fn get(&self, id: &StreamId) -> Option<Arc<dyn EventStream>> {
        self.streams
            .read()
            .get(id)
            .map(|s| Arc::clone(s) as Arc<dyn EventStream>)
    }

    fn delete(&self, id: &StreamId) -> bool {
        let removed = self.streams.write().remove(id);
        match removed {
            Some(stream) => {
                stream.close();
                info!(stream_id = %id, "deleted stream");
                true
            }
            None => {
                debug!(stream_id = %id, "delete of unknown stream ignored");
                false
            }
        }
    }

    fn stream_ids(&self) -> Vec<StreamId> {
        self.streams.read().keys().copied().collect()
    }

    fn len(&self) -> usize {
        self.streams.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewEvent;
    use std::thread;

    #[test]
    fn test_create_get_delete_lifecycle() {
        let repo = InMemoryRepository::new(16);
        let stream = repo.create();
        let id = stream.stream_id();

        for data in ["a", "b", "c"] {
            stream.append(NewEvent::new(data)).unwrap();
        }
        let events = repo.read_after(&id, Some(EventId::new(0))).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "b");

        assert!(repo.delete(&id));
        assert!(repo.get(&id).is_none());
        assert_eq!(
            repo.read_after(&id, None).unwrap_err(),
            StreamError::StreamNotFound(id)
        );
        // Handles held across the delete fail too
        assert!(matches!(stream.read_after(None), Err(StreamError::StreamNotFound(_))));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let repo = InMemoryRepository::new(4);
        let id = repo.create().stream_id();
        assert!(repo.delete(&id));
        assert!(!repo.delete(&id));
        assert!(repo.is_empty());
    }

    #[test]
    fn test_get_unknown_stream() {
        let repo = InMemoryRepository::new(4);
        assert!(repo.get(&StreamId::generate()).is_none());
    }

    #[test]
    fn test_create_with_capacity_overrides_default() {
        let repo = InMemoryRepository::new(100);
        let stream = repo.create_with_capacity(2);
        assert_eq!(stream.stats().capacity, 2);
        assert_eq!(repo.create().stats().capacity, 100);
    }

    #[test]
    fn test_concurrent_create_and_delete() {
        let repo = Arc::new(InMemoryRepository::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = Arc::clone(&repo);
                thread::spawn(move || {
                    let mut kept = Vec::new();
                    for i in 0..50 {
                        let id = repo.create().stream_id();
                        if i % 2 == 0 {
                            assert!(repo.delete(&id));
                        } else {
                            kept.push(id);
                        }
                    }
                    kept
                })
            })
            .collect();

        let kept: Vec<StreamId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        assert_eq!(repo.len(), kept.len());
        for id in kept {
            assert!(repo.get(&id).is_some());
        }
    }
}
