//! bibup-queue library interface
//!
//! Metadata-update queue and diff-reconciliation engine: queued records are
//! looked up one at a time, field-level differences are computed against the
//! stored record, the user accepts or rejects each difference, and accepted
//! values are committed back per row.

pub mod api;
pub mod committer;
pub mod config;
pub mod db;
pub mod diff;
pub mod error;
pub mod policy;
pub mod processor;
pub mod row;
pub mod schema;
pub mod services;
pub mod store;
pub mod updater;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};
pub use crate::updater::{EscapeOutcome, MetadataUpdater};

use axum::Router;
use bibup_common::events::EventBus;
use chrono::{DateTime, Utc};
use crate::services::OnlineFlag;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub updater: Arc<MetadataUpdater>,
    /// Event bus feeding the SSE stream
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Connectivity flag the host may set over HTTP; None when not controllable
    pub online_flag: Option<OnlineFlag>,
}

impl AppState {
    pub fn new(updater: Arc<MetadataUpdater>) -> Self {
        let event_bus = updater.state().event_bus.clone();
        Self {
            updater,
            event_bus,
            startup_time: Utc::now(),
            online_flag: None,
        }
    }

    /// Expose `flag` (the processor's connectivity check) at `/connectivity`
    pub fn with_online_flag(mut self, flag: OnlineFlag) -> Self {
        self.online_flag = Some(flag);
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::queue_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
