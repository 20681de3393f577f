use std::{env, sync::Arc};

mod core;
mod error_handler;
mod middleware_layer;
mod routes;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use review_engine::{ConfigSnapshot, ReviewEngine};
use tokio::signal;
use tracing::info;

use crate::middleware_layer::request_id::attach_request_id;
use crate::routes::health::health_route::health_route;
use crate::routes::webhook::webhook_gitea_route::webhook_gitea_route;

pub use crate::core::app_state::AppState;
pub use crate::error_handler::{AppError, AppResult};

/// Builds the HTTP surface over shared state. Tests drive this router
/// directly without binding a socket.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook/gitea", post(webhook_gitea_route))
        .route("/healthz", get(health_route))
        .layer(middleware::from_fn(attach_request_id))
        .with_state(state)
}

/// Starts the server over a validated configuration snapshot.
pub async fn start(snapshot: Arc<ConfigSnapshot>) -> AppResult<()> {
    let host_url = env::var("API_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

    let engine = ReviewEngine::new(snapshot).map_err(AppError::Engine)?;
    let app = router(Arc::new(AppState::new(engine)));

    let listener = tokio::net::TcpListener::bind(&host_url)
        .await
        .map_err(AppError::Bind)?;
    info!(address = %host_url, "webhook listener ready");

    // Serve with graceful shutdown on Ctrl+C.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Server)?;

    Ok(())
}

/// Returns a future that resolves when Ctrl+C is pressed.
async fn shutdown_signal() {
    if let Err(error) = signal::ctrl_c().await {
        // Without a signal handler the process runs until killed.
        tracing::error!(%error, "failed to install shutdown signal handler");
        std::future::pending::<()>().await;
    }
}
