//! 健康检查路由
//!
//! # 路由列表
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /health | GET | 简单健康检查 |
//! | /health/detailed | GET | 账本、对账、批次状态 |

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use shared::util::now_millis;
use std::time::SystemTime;

use crate::core::ServerState;
use crate::orders::StorageStats;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/detailed", get(detailed_health))
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
pub struct DetailedHealthResponse {
    status: &'static str,
    version: &'static str,
    /// 运行时间 (秒)
    uptime_seconds: u64,
    checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    database: CheckResult,
    /// 对账周期是否正在运行
    sync_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_sync_error: Option<String>,
    active_batches: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    orders: Option<StorageStats>,
}

#[derive(Serialize)]
pub struct CheckResult {
    status: &'static str,
    latency_ms: Option<u64>,
    message: Option<String>,
}

// 服务器启动时间 (懒加载静态变量)
static START_TIME: std::sync::OnceLock<SystemTime> = std::sync::OnceLock::new();

fn get_uptime_seconds() -> u64 {
    let start = START_TIME.get_or_init(SystemTime::now);
    SystemTime::now()
        .duration_since(*start)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub async fn health() -> Json<HealthResponse> {
    // 首次调用时记录启动时间
    get_uptime_seconds();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn detailed_health(State(state): State<ServerState>) -> Json<DetailedHealthResponse> {
    let db_start = std::time::Instant::now();
    let (database, orders) = match state.storage.get_stats() {
        Ok(stats) => (
            CheckResult {
                status: "ok",
                latency_ms: Some(db_start.elapsed().as_millis() as u64),
                message: None,
            },
            Some(stats),
        ),
        Err(e) => (
            CheckResult {
                status: "error",
                latency_ms: None,
                message: Some(format!("Database error: {e}")),
            },
            None,
        ),
    };

    let sync = state.reconciliation.stats();
    let degraded = database.status != "ok" || sync.last_error.is_some();

    Json(DetailedHealthResponse {
        status: if degraded { "degraded" } else { "healthy" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: get_uptime_seconds(),
        checks: HealthChecks {
            database,
            sync_running: sync.is_running,
            last_sync_error: sync.last_error,
            active_batches: state.batches.list(now_millis()).len(),
            orders,
        },
    })
}
