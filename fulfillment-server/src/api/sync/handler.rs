//! Sync API Handlers

use axum::{Json, extract::State};

use crate::core::ServerState;
use crate::sync::source::ConnectionInfo;
use crate::sync::{SyncRun, SyncStats};
use crate::utils::AppResult;

/// POST /api/sync - 手动触发对账
///
/// 已有周期运行时直接返回 `{"result": "skipped"}`
pub async fn trigger_sync(State(state): State<ServerState>) -> Json<SyncRun> {
    Json(state.reconciliation.run_sync().await)
}

/// GET /api/sync/status - 调度统计
pub async fn get_sync_status(State(state): State<ServerState>) -> Json<SyncStats> {
    Json(state.reconciliation.stats())
}

/// GET /api/sync/connection - 测试外部系统连接
pub async fn test_connection(State(state): State<ServerState>) -> AppResult<Json<ConnectionInfo>> {
    let info = state.reconciliation.source().test_connection().await?;
    Ok(Json(info))
}
