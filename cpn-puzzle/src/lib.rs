//! cpn-puzzle library interface
//!
//! Chess puzzle retrieval service: Lichess lookups with recency filtering,
//! dataset sampling, and two completion-model pipelines (candidate selection
//! and free-form composition). Exposed as a library for integration tests.

pub mod api;
pub mod clients;
pub mod config;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use services::PuzzleService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PuzzleService>,
    /// Cancelled on shutdown; handlers derive child tokens from it
    pub shutdown: CancellationToken,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last server-side error, reported by /health
    pub last_error: Arc<RwLock<Option<String>>>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(service: Arc<PuzzleService>, shutdown: CancellationToken, request_timeout: Duration) -> Self {
        Self {
            service,
            shutdown,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
            request_timeout,
        }
    }

    /// Token for one request; cancelled when the service shuts down
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    pub async fn record_error(&self, message: String) {
        *self.last_error.write().await = Some(message);
    }
}

/// Build application router
///
/// Routes are served under `/api/v1`, with `/health` also at the top level.
pub fn build_router(state: AppState) -> Router {
    let timeout = state.request_timeout;

    let v1 = Router::new()
        .merge(api::puzzle_routes())
        .merge(api::health_routes());

    Router::new()
        .nest("/api/v1", v1)
        .merge(api::health_routes())
        .with_state(state)
        .layer(TimeoutLayer::new(timeout))
        .layer(CatchPanicLayer::custom(error::panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
