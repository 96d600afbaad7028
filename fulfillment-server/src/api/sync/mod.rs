//! Sync API 模块
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/sync | POST | 手动触发对账周期 |
//! | /api/sync/status | GET | 调度统计 |
//! | /api/sync/connection | GET | 测试外部系统连接 |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/sync", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::trigger_sync))
        .route("/status", get(handler::get_sync_status))
        .route("/connection", get(handler::test_connection))
}
