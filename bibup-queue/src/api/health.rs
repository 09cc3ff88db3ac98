//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Module name ("bibup-queue")
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Rows currently tracked
    pub rows_count: usize,
    pub processing: bool,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "bibup-queue".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        rows_count: state.updater.rows_count().await,
        processing: state.updater.is_processing(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
