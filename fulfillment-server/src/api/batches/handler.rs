//! Batch API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use shared::batch::ConsolidatedLine;
use shared::util::now_millis;

use crate::batching::{
    Batch, BatchPreview, BatchReport, CreateBatchRequest, PickRequest, PickResult,
};
use crate::core::ServerState;
use crate::utils::AppResult;

/// GET /api/batches
pub async fn list(State(state): State<ServerState>) -> Json<Vec<Batch>> {
    Json(state.batches.list(now_millis()))
}

/// GET /api/batches/preview
pub async fn preview(State(state): State<ServerState>) -> AppResult<Json<Vec<BatchPreview>>> {
    Ok(Json(state.batches.preview(now_millis())?))
}

/// POST /api/batches
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<CreateBatchRequest>,
) -> AppResult<Json<Batch>> {
    Ok(Json(state.batches.create(payload, now_millis()).await?))
}

/// GET /api/batches/{id}
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Batch>> {
    Ok(Json(state.batches.get(&id, now_millis())?))
}

/// GET /api/batches/{id}/current
///
/// 全部拣完时返回 `null`
pub async fn current_line(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Option<ConsolidatedLine>>> {
    Ok(Json(state.batches.current_line(&id, now_millis())?))
}

/// POST /api/batches/{id}/pick
pub async fn pick(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<PickRequest>,
) -> AppResult<Json<PickResult>> {
    Ok(Json(state.batches.confirm_pick(&id, payload, now_millis())?))
}

/// POST /api/batches/{id}/complete
pub async fn complete(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<BatchReport>> {
    Ok(Json(state.batches.complete(&id, now_millis()).await?))
}
