//! Queue intent handlers
//!
//! GET /rows, POST /queue, POST /rows/:item_id/toggle, POST /rows/:item_id/open,
//! POST /items/:item_id/changed, POST /apply, POST /cancel, POST /close, POST /escape,
//! GET/POST /connectivity

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bibup_common::{ItemId, QueueProgress, RowSnapshot};
use serde::{Deserialize, Serialize};

use crate::committer::ApplyReport;
use crate::error::{ApiError, ApiResult};
use crate::services::{Connectivity, OnlineFlag};
use crate::updater::EscapeOutcome;
use crate::AppState;

/// GET /rows response
#[derive(Debug, Serialize)]
pub struct RowsResponse {
    pub rows: Vec<RowSnapshot>,
    pub rows_count: usize,
    pub progress: QueueProgress,
    pub processing: bool,
}

/// POST /queue request
#[derive(Debug, Deserialize)]
pub struct QueueRequest {
    pub item_ids: Vec<ItemId>,
}

/// POST /queue response
#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub requested: usize,
    pub queued: usize,
}

/// POST /rows/:item_id/toggle request; no field name toggles the whole row
#[derive(Debug, Default, Deserialize)]
pub struct ToggleRequest {
    #[serde(default)]
    pub field_name: Option<String>,
}

/// POST /items/:item_id/changed response
#[derive(Debug, Serialize)]
pub struct ChangedResponse {
    pub item_id: ItemId,
    pub updated: bool,
}

/// POST /cancel, /close, /escape response
#[derive(Debug, Serialize)]
pub struct CloseResponse {
    pub outcome: EscapeOutcome,
    pub rows_count: usize,
}

/// GET/POST /connectivity body
#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectivityState {
    pub offline: bool,
}

/// GET /rows
pub async fn list_rows(State(state): State<AppState>) -> Json<RowsResponse> {
    let rows = state.updater.rows().await;
    Json(RowsResponse {
        rows_count: rows.len(),
        progress: QueueProgress::from_rows(&rows),
        rows,
        processing: state.updater.is_processing(),
    })
}

/// POST /queue
///
/// Queues the items and starts processing in the background. 202 Accepted.
pub async fn queue_items(
    State(state): State<AppState>,
    Json(request): Json<QueueRequest>,
) -> ApiResult<(StatusCode, Json<QueueResponse>)> {
    if request.item_ids.is_empty() {
        return Err(ApiError::BadRequest("item_ids must not be empty".to_string()));
    }

    let queued = state.updater.enqueue_items(&request.item_ids).await?;

    let updater = state.updater.clone();
    tokio::spawn(async move {
        match updater.process_queue().await {
            Some(summary) => tracing::debug!(?summary, "Background queue processing completed"),
            None => tracing::debug!("Queue processor already running"),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(QueueResponse {
            requested: request.item_ids.len(),
            queued,
        }),
    ))
}

/// POST /rows/:item_id/toggle
pub async fn toggle_row(
    State(state): State<AppState>,
    Path(item_id): Path<ItemId>,
    request: Option<Json<ToggleRequest>>,
) -> ApiResult<Json<RowSnapshot>> {
    let Json(request) = request.unwrap_or_default();

    if state.updater.state().rows.get(item_id).await.is_none() {
        return Err(ApiError::NotFound(format!("Row not found: {}", item_id)));
    }

    let field_name = request.field_name.as_deref();
    if !state
        .updater
        .toggle_field_acceptance(item_id, field_name)
        .await
    {
        return Err(ApiError::NotFound(format!(
            "Field not found in row {}: {}",
            item_id,
            field_name.unwrap_or_default()
        )));
    }

    state
        .updater
        .state()
        .rows
        .get(item_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Row not found: {}", item_id)))
}

/// POST /rows/:item_id/open
pub async fn open_item(
    State(state): State<AppState>,
    Path(item_id): Path<ItemId>,
) -> StatusCode {
    state.updater.open_item(item_id);
    StatusCode::ACCEPTED
}

/// POST /items/:item_id/changed
pub async fn item_changed(
    State(state): State<AppState>,
    Path(item_id): Path<ItemId>,
) -> ApiResult<Json<ChangedResponse>> {
    let updated = state.updater.notify_item_changed(item_id).await?;
    Ok(Json(ChangedResponse { item_id, updated }))
}

/// POST /apply
pub async fn apply(State(state): State<AppState>) -> Json<ApplyReport> {
    Json(state.updater.apply().await)
}

/// POST /cancel
pub async fn cancel(State(state): State<AppState>) -> Json<CloseResponse> {
    state.updater.cancel().await;
    Json(CloseResponse {
        outcome: EscapeOutcome::CloseAndClear,
        rows_count: 0,
    })
}

/// POST /close
pub async fn close(State(state): State<AppState>) -> Json<CloseResponse> {
    state.updater.close().await;
    Json(CloseResponse {
        outcome: EscapeOutcome::CloseAndClear,
        rows_count: 0,
    })
}

/// POST /escape
pub async fn escape(State(state): State<AppState>) -> Json<CloseResponse> {
    let outcome = state.updater.escape_pressed().await;
    Json(CloseResponse {
        outcome,
        rows_count: state.updater.rows_count().await,
    })
}

fn online_flag(state: &AppState) -> ApiResult<&OnlineFlag> {
    state
        .online_flag
        .as_ref()
        .ok_or_else(|| ApiError::Conflict("Connectivity is not externally controlled".to_string()))
}

/// GET /connectivity
pub async fn get_connectivity(State(state): State<AppState>) -> ApiResult<Json<ConnectivityState>> {
    let flag = online_flag(&state)?;
    Ok(Json(ConnectivityState {
        offline: flag.is_offline(),
    }))
}

/// POST /connectivity
///
/// Host-reported network state; the processor reads it before every row.
pub async fn set_connectivity(
    State(state): State<AppState>,
    Json(request): Json<ConnectivityState>,
) -> ApiResult<Json<ConnectivityState>> {
    let flag = online_flag(&state)?;
    flag.set_offline(request.offline);
    Ok(Json(ConnectivityState {
        offline: flag.is_offline(),
    }))
}

/// Build queue intent routes
pub fn queue_routes() -> Router<AppState> {
    Router::new()
        .route("/rows", get(list_rows))
        .route("/queue", post(queue_items))
        .route("/rows/:item_id/toggle", post(toggle_row))
        .route("/rows/:item_id/open", post(open_item))
        .route("/items/:item_id/changed", post(item_changed))
        .route("/apply", post(apply))
        .route("/cancel", post(cancel))
        .route("/close", post(close))
        .route("/escape", post(escape))
        .route("/connectivity", get(get_connectivity).post(set_connectivity))
}
