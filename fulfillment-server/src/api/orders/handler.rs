//! Order API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::order::{Order, OrderStatus};
use shared::util::now_millis;

use crate::core::ServerState;
use crate::orders::projects::summarize;
use crate::orders::{OrderFilter, ProjectSummary, StatusChange, StorageStats};
use crate::utils::{AppError, AppResult};

/// Query params for listing orders
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// 逗号分隔的状态列表
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub batch: Option<String>,
}

impl ListQuery {
    fn into_filter(self) -> AppResult<OrderFilter> {
        let statuses = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                raw.split(',')
                    .map(|s| s.trim().parse::<OrderStatus>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| AppError::validation(e.to_string()))?,
            ),
        };
        Ok(OrderFilter {
            ids: None,
            statuses,
            batch_id: self.batch,
            project_id: self.project,
        })
    }
}

/// GET /api/orders
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Order>>> {
    let filter = query.into_filter()?;
    Ok(Json(state.storage.list(&filter)?))
}

/// GET /api/orders/stats
pub async fn stats(State(state): State<ServerState>) -> AppResult<Json<StorageStats>> {
    Ok(Json(state.storage.get_stats()?))
}

/// GET /api/orders/projects
pub async fn projects(State(state): State<ServerState>) -> AppResult<Json<Vec<ProjectSummary>>> {
    let orders = state.storage.list(&OrderFilter::default())?;
    Ok(Json(summarize(&orders, now_millis())))
}

/// GET /api/orders/{id}
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    let order = state
        .storage
        .get(&id)?
        .ok_or_else(|| AppError::not_found(format!("Order {} not found", id)))?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub tracking_numbers: Vec<String>,
}

/// PUT /api/orders/{id}/status
///
/// 本地先落库；外部回写失败时 `pushed = false` 并带上 `push_error`
pub async fn update_status(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> AppResult<Json<StatusChange>> {
    let change = state
        .status
        .update_status(&id, payload.status, payload.tracking_numbers, now_millis())
        .await?;
    Ok(Json(change))
}
