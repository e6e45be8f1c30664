//! Event Store Statistics
//!
//! Provides statistics about streams:
//! - Retained, appended and evicted counts per stream
//! - Aggregates across the repository

use serde::Serialize;

use super::repository::EventStreamRepository;
use crate::types::{EventId, StreamId};

/// Point-in-time statistics of one stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub stream_id: StreamId,
    /// Maximum number of retained events
    pub capacity: usize,
    /// Events currently held
    pub retained: usize,
    /// Events appended over the stream's lifetime
    pub appended: u64,
    /// Events dropped by eviction
    pub evicted: u64,
    pub oldest_retained_id: EventId,
    pub next_id: EventId,
    pub closed: bool,
}

impl StreamStats {
    /// Whether readers starting at the origin would hit a gap
    pub fn has_evicted(&self) -> bool {
        self.evicted > 0
    }
}

/// Aggregate statistics across every live stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryStats {
    pub stream_count: usize,
    pub retained_events: usize,
    pub appended_events: u64,
    pub evicted_events: u64,
}

impl RepositoryStats {
    /// Collect statistics from a repository
    pub fn collect(repository: &dyn EventStreamRepository) -> Self {
        repository
            .stream_ids()
            .iter()
            .filter_map(|id| repository.get(id))
            .map(|stream| stream.stats())
            .fold(Self::default(), |mut acc, stats| {
                acc.stream_count += 1;
                acc.retained_events += stats.retained;
                acc.appended_events += stats.appended;
                acc.evicted_events += stats.evicted;
                acc
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::InMemoryRepository;
    use crate::types::NewEvent;

    #[test]
    fn test_collect_aggregates_streams() {
        let repo = InMemoryRepository::new(2);
        let a = repo.create();
        let b = repo.create();
        for i in 0..3 {
            a.append(NewEvent::new(i.to_string())).unwrap();
        }
        b.append(NewEvent::new("only")).unwrap();

        let stats = RepositoryStats::collect(&repo);
        assert_eq!(stats.stream_count, 2);
        assert_eq!(stats.appended_events, 4);
        assert_eq!(stats.evicted_events, 1);
        assert_eq!(stats.retained_events, 3);
    }

    #[test]
    fn test_collect_on_empty_repository() {
        let repo = InMemoryRepository::new(8);
        assert_eq!(RepositoryStats::collect(&repo), RepositoryStats::default());
    }
}
