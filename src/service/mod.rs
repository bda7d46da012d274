//! HTTP service over the runner.
//!
//! ```text
//! GET  /health  liveness plus defaults and registered recipes
//! POST /run     body is a run request; responds {"status":"ok","event":{..}}
//! ```
//!
//! Runs block on the engine, so handlers hand them to the blocking pool.
//! Shutdown is driven by a [`CancellationToken`] wired to axum's graceful
//! shutdown.

mod api;

use std::sync::Arc;

use axum::{Router, routing::{get, post}};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::AppError;
use crate::runner::Runner;

/// Router state injected into every handler via [`axum::extract::State`].
#[derive(Clone)]
pub struct ServiceState {
    pub runner: Arc<Runner>,
}

pub fn build_router(state: ServiceState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/run",    post(api::run))
        .with_state(state)
}

/// Bind `bind_addr` and serve until `shutdown` is cancelled.
pub async fn serve(runner: Arc<Runner>, bind_addr: &str, shutdown: CancellationToken) -> Result<(), AppError> {
    let router = build_router(ServiceState { runner });

    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| AppError::Service(format!("bind failed on {bind_addr}: {e}")))?;

    info!(%bind_addr, "http service listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Service(format!("server error: {e}")))?;

    info!("http service shut down");
    Ok(())
}
