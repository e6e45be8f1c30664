//! SSE Streams - Binary Entry Point
//!
//! Serves the stream API until Ctrl+C, then drains the emission scheduler.

use std::sync::Arc;

use sse_streams::api::{http, AppState};
use sse_streams::ServerConfig;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sse_streams=info,tower_http=info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    info!(
        version = sse_streams::VERSION,
        bind_addr = %config.bind_addr,
        stream_capacity = config.stream_capacity,
        "starting sse server"
    );

    let state = Arc::new(AppState::from_config(&config));
    let scheduler = Arc::clone(&state.scheduler);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("shutdown signal received");
        signal.cancel();
    })?;

    let listener = TcpListener::bind(config.bind_addr).await?;
    http::serve(listener, state, shutdown.cancelled_owned()).await?;

    let report = scheduler.shutdown().await;
    info!(
        drained = report.drained,
        abandoned = report.abandoned,
        "sse server stopped"
    );
    Ok(())
}
