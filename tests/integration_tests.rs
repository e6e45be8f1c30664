//! Integration tests for the event stream repository

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use sse_streams::error::StreamError;
use sse_streams::event_store::RepositoryStats;
use sse_streams::{EventId, EventStreamRepository, InMemoryRepository, NewEvent};

fn setup_repository(capacity: usize) -> Arc<dyn EventStreamRepository> {
    Arc::new(InMemoryRepository::new(capacity))
}

fn ids(events: &[Arc<sse_streams::Event>]) -> Vec<u64> {
    events.iter().map(|e| e.id.value()).collect()
}

#[test]
fn test_stream_lifecycle() {
    let repo = setup_repository(16);
    let stream = repo.create();
    let stream_id = stream.stream_id();

    let assigned: Vec<u64> = ["a", "b", "c"]
        .iter()
        .map(|data| stream.append(NewEvent::new(*data)).unwrap().id.value())
        .collect();
    assert_eq!(assigned, vec![0, 1, 2]);

    let after_first = repo.read_after(&stream_id, Some(EventId::new(0))).unwrap();
    let pairs: Vec<(u64, &str)> = after_first
        .iter()
        .map(|e| (e.id.value(), e.data.as_str()))
        .collect();
    assert_eq!(pairs, vec![(1, "b"), (2, "c")]);

    assert!(repo.delete(&stream_id));
    assert!(repo.get(&stream_id).is_none());
    assert_eq!(
        repo.read_after(&stream_id, None).unwrap_err(),
        StreamError::StreamNotFound(stream_id)
    );
    // The caller's handle is closed too
    assert!(matches!(
        stream.read_after(None),
        Err(StreamError::StreamNotFound(_))
    ));
}

#[test]
fn test_eviction_boundary() {
    let repo = setup_repository(2);
    let stream = repo.create();
    for data in ["x", "y", "z"] {
        stream.append(NewEvent::new(data)).unwrap();
    }

    match stream.read_after(None) {
        Err(StreamError::EventsLost {
            oldest_retained_id, ..
        }) => assert_eq!(oldest_retained_id, EventId::new(1)),
        other => panic!("expected EventsLost, got {other:?}"),
    }

    // The reader saw x (id 0); y is the next event it needs and is retained
    let after_x = stream.read_after(Some(EventId::new(0))).unwrap();
    assert_eq!(ids(&after_x), vec![1, 2]);
    assert_eq!(after_x[1].data, "z");

    assert!(stream.read_after(Some(EventId::new(2))).unwrap().is_empty());
}

#[test]
fn test_lost_exactly_below_oldest_minus_one() {
    let repo = setup_repository(4);
    let stream = repo.create();
    for i in 0..20 {
        stream.append(NewEvent::new(i.to_string())).unwrap();
    }
    let oldest = stream.oldest_retained_id().value();
    assert_eq!(oldest, 16);

    for cursor in 0..20u64 {
        let result = stream.read_after(Some(EventId::new(cursor)));
        if cursor < oldest - 1 {
            assert!(matches!(result, Err(StreamError::EventsLost { .. })), "cursor {cursor}");
        } else {
            let events = result.unwrap();
            let expected: Vec<u64> = (cursor + 1..20).collect();
            assert_eq!(ids(&events), expected, "cursor {cursor}");
        }
    }
}

#[test]
fn test_concurrent_producers_single_total_order() {
    let repo = setup_repository(10_000);
    let stream = repo.create();
    let mut handles = vec![];

    for producer in 0..8 {
        let stream = Arc::clone(&stream);
        handles.push(thread::spawn(move || {
            let mut assigned = Vec::with_capacity(250);
            for seq in 0..250 {
                let event = stream
                    .append(NewEvent::new(format!("{producer}:{seq}")))
                    .unwrap();
                assigned.push(event.id.value());
            }
            assigned
        }));
    }

    let mut all_assigned = HashSet::new();
    for handle in handles {
        let assigned = handle.join().unwrap();
        // Each producer observes its own appends in increasing order
        assert!(assigned.windows(2).all(|w| w[0] < w[1]));
        for id in assigned {
            assert!(all_assigned.insert(id), "duplicate id {id}");
        }
    }
    assert_eq!(all_assigned.len(), 2000);

    let events = stream.read_after(None).unwrap();
    assert_eq!(ids(&events), (0..2000).collect::<Vec<u64>>());

    // Per-producer order is preserved within the total order
    for producer in 0..8 {
        let prefix = format!("{producer}:");
        let seqs: Vec<u32> = events
            .iter()
            .filter_map(|e| e.data.strip_prefix(&prefix))
            .map(|s| s.parse().unwrap())
            .collect();
        assert_eq!(seqs, (0..250).collect::<Vec<u32>>());
    }
}

#[test]
fn test_concurrent_readers_never_repeat() {
    let repo = setup_repository(64);
    let stream = repo.create();

    let writer = {
        let stream = Arc::clone(&stream);
        thread::spawn(move || {
            for i in 0..500 {
                stream.append(NewEvent::new(i.to_string())).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let stream = Arc::clone(&stream);
            thread::spawn(move || {
                let mut cursor: Option<EventId> = None;
                let mut last_seen: Option<u64> = None;
                let mut lost = 0;
                while last_seen != Some(499) {
                    match stream.read_after(cursor) {
                        Ok(events) => {
                            for event in events {
                                let id = event.id.value();
                                if let Some(prev) = last_seen {
                                    assert!(id > prev, "id {id} after {prev}");
                                }
                                last_seen = Some(id);
                                cursor = Some(event.id);
                            }
                        }
                        Err(StreamError::EventsLost {
                            oldest_retained_id, ..
                        }) => {
                            // Resync just before the oldest retained event
                            lost += 1;
                            cursor = oldest_retained_id.prev();
                        }
                        Err(e) => panic!("unexpected error {e}"),
                    }
                    thread::yield_now();
                }
                lost
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn test_concurrent_create_and_delete() {
    let repo = setup_repository(8);
    let mut handles = vec![];

    for _ in 0..8 {
        let repo = Arc::clone(&repo);
        handles.push(thread::spawn(move || {
            let mut kept = vec![];
            for i in 0..50 {
                let stream = repo.create();
                stream.append(NewEvent::new("e")).unwrap();
                if i % 2 == 0 {
                    assert!(repo.delete(&stream.stream_id()));
                } else {
                    kept.push(stream.stream_id());
                }
            }
            kept
        }));
    }

    let mut kept = HashSet::new();
    for handle in handles {
        kept.extend(handle.join().unwrap());
    }

    assert_eq!(repo.len(), 200);
    assert_eq!(kept.len(), 200);
    assert_eq!(repo.stream_ids().into_iter().collect::<HashSet<_>>(), kept);

    let stats = RepositoryStats::collect(repo.as_ref());
    assert_eq!(stats.stream_count, 200);
    assert_eq!(stats.retained_events, 200);
}
