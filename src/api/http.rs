//! HTTP server setup with Axum

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tokio::net::TcpListener;
use tracing::info;

use super::rest::streams;
use super::sse::handler::{redirect_handler, stream_handler};
use super::state::AppState;

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    // Browsers may consume streams cross-origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // SSE endpoints
        .route("/stream/:id", get(stream_handler))
        .route("/redirect/:id", get(redirect_handler))
        // Health check
        .route("/health", get(health_check))
        // Stream management
        .route(
            "/streams",
            post(streams::create_stream).get(streams::list_streams),
        )
        .route(
            "/streams/:id",
            get(streams::get_stream).delete(streams::delete_stream),
        )
        .route("/streams/:id/events", post(streams::append_event))
        .route("/stats", get(streams::server_stats))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the router on `listener` until `shutdown` resolves
///
/// Every stream is closed once the signal fires, so connected readers end
/// and graceful shutdown does not wait on open responses forever.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(addr = %listener.local_addr()?, "listening");

    let repository = Arc::clone(&state.repository);
    let close_streams = async move {
        shutdown.await;
        let ids = repository.stream_ids();
        info!(streams = ids.len(), "closing streams for shutdown");
        for id in ids {
            repository.delete(&id);
        }
    };

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(close_streams)
        .await
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
