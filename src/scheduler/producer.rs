//! Event producers driven by the scheduler

use crate::types::NewEvent;

/// Source of periodic events for one stream
///
/// `produce` always runs on a blocking thread, either on a pool worker or on
/// behalf of the ticker when the pool is saturated, and should return promptly.
pub trait Producer: Send + Sync + 'static {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Build the event for the given tick (0, 1, 2, ...)
    fn produce(&self, tick: u64) -> NewEvent;
}

/// Emits the current time as a `heartbeat` event
#[derive(Debug, Clone, Default)]
pub struct Heartbeat;

impl Producer for Heartbeat {
    fn name(&self) -> &str {
        "heartbeat"
    }

    fn produce(&self, tick: u64) -> NewEvent {
        let payload = serde_json::json!({
            "tick": tick,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        NewEvent::new(payload.to_string()).with_type("heartbeat")
    }
}

/// Adapter turning a closure into a [`Producer`]
pub struct FnProducer<F> {
    name: String,
    f: F,
}

impl<F> Producer for FnProducer<F>
where
    F: Fn(u64) -> NewEvent + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn produce(&self, tick: u64) -> NewEvent {
        (self.f)(tick)
    }
}

/// Build a producer from a closure
pub fn from_fn<F>(name: impl Into<String>, f: F) -> FnProducer<F>
where
    F: Fn(u64) -> NewEvent + Send + Sync + 'static,
{
    FnProducer {
        name: name.into(),
        f,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_payload() {
        let event = Heartbeat.produce(3);
        assert_eq!(event.event_type.as_deref(), Some("heartbeat"));
        let payload: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(payload["tick"], 3);
        assert!(payload["timestamp"].is_string());
    }

    #[test]
    fn test_fn_producer() {
        let producer = from_fn("counter", |tick| NewEvent::new(format!("tick {tick}")));
        assert_eq!(producer.name(), "counter");
        assert_eq!(producer.produce(5).data, "tick 5");
    }
}
