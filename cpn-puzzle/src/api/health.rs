//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::services::CapabilityReport;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when no completion model is configured
    pub status: String,
    /// Module name ("cpn-puzzle")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    pub capabilities: CapabilityReport,
    /// Last error message if any (for diagnostics)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let capabilities = state.service.capabilities();
    let last_error = state.last_error.read().await.clone();

    Json(HealthResponse {
        status: if capabilities.completion { "ok" } else { "degraded" }.to_string(),
        module: "cpn-puzzle".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        capabilities,
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
