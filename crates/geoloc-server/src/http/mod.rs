//! HTTP server implementation using axum.

use crate::error::ServerError;
use crate::server::AppState;
use axum::Router;
use axum::routing::get;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod handlers;

/// Create HTTP router with all endpoints.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ip", get(handlers::handle_lookup))
        .route("/healthz", get(handlers::handle_healthz))
        .route("/readiness", get(handlers::handle_readiness))
        .route("/updatedb", get(handlers::handle_update))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `bind_addr` and serve until `shutdown` resolves.
///
/// # Errors
///
/// Returns `ServerError` if the server fails to bind or encounters a runtime error.
pub async fn start_server<F>(
    bind_addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|source| ServerError::HttpBindFailed {
            addr: bind_addr,
            source,
        })?;

    tracing::info!("HTTP server listening on {}", bind_addr);

    serve(listener, state, shutdown).await
}

/// Serve on an already bound listener until `shutdown` resolves.
///
/// In-flight requests are allowed to finish.
///
/// # Errors
///
/// Returns `ServerError` if the server encounters a runtime error.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Shutdown(format!("HTTP server error: {e}")))
}
