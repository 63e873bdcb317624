//! Axum HTTP channel for the assistant.
//!
//! ```text
//! GET  /api/health
//! POST /api/assistant/query   (Authorization: Bearer <jwt>)
//! ```
//!
//! [`run`] serves until the shutdown token is cancelled, then drains
//! in-flight requests through axum's graceful shutdown.

mod api;
pub mod auth;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::assistant::Assistant;
use crate::config::Config;
use crate::error::AppError;

/// Router state injected into every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<Assistant>,
    /// HS256 secret for bearer tokens; `None` rejects every query.
    pub jwt_secret: Option<Arc<str>>,
    /// Active model name reported by the health endpoint.
    pub model: Arc<str>,
}

impl AppState {
    pub fn new(assistant: Assistant, config: &Config) -> Self {
        if config.jwt_secret.is_none() {
            warn!("JWT_SECRET is not set — every assistant query will be rejected with 401");
        }
        Self {
            assistant: Arc::new(assistant),
            jwt_secret: config.jwt_secret.as_deref().map(Arc::from),
            model: Arc::from(config.llm.active_model()),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health",          get(api::health))
        .route("/api/assistant/query", post(api::query))
        .with_state(state)
}

/// Bind `bind_addr` and serve until `shutdown` fires.
pub async fn run(bind_addr: &str, state: AppState, shutdown: CancellationToken) -> Result<(), AppError> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| AppError::Server(format!("bind failed on {bind_addr}: {e}")))?;

    let local = listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| bind_addr.to_string());
    info!(bind_addr = %local, "http server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Server(format!("http server error: {e}")))?;

    info!("http server shut down");
    Ok(())
}
