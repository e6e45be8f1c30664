//! Shared application state

use std::sync::Arc;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::event_store::{EventStreamRepository, InMemoryRepository};
use crate::scheduler::EmissionScheduler;

/// State shared by every request handler
pub struct AppState {
    /// Registry of live streams
    pub repository: Arc<dyn EventStreamRepository>,

    /// Scheduler running heartbeat producers
    pub scheduler: Arc<EmissionScheduler>,

    /// Idle interval before a keep-alive comment is sent
    pub keep_alive: Duration,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn EventStreamRepository>,
        scheduler: Arc<EmissionScheduler>,
        keep_alive: Duration,
    ) -> Self {
        Self {
            repository,
            scheduler,
            keep_alive,
        }
    }

    /// Build an in-memory repository and start a scheduler over it
    ///
    /// Must be called inside a Tokio runtime.
    pub fn from_config(config: &ServerConfig) -> Self {
        let repository: Arc<dyn EventStreamRepository> =
            Arc::new(InMemoryRepository::new(config.stream_capacity));
        let scheduler = Arc::new(EmissionScheduler::start(
            config.scheduler.clone(),
            Arc::clone(&repository),
        ));
        Self::new(repository, scheduler, config.keep_alive_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_config_uses_capacity() {
        let config = ServerConfig {
            stream_capacity: 3,
            keep_alive_interval: Duration::from_millis(250),
            ..ServerConfig::default()
        };
        let state = AppState::from_config(&config);
        assert_eq!(state.keep_alive, Duration::from_millis(250));

        let stream = state.repository.create();
        assert_eq!(stream.stats().capacity, 3);
        state.scheduler.shutdown().await;
    }
}
