//! Order API Module
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/orders | GET | 订单列表 (`?status=new,in_progress&project=P100`) |
//! | /api/orders/stats | GET | 按状态计数 |
//! | /api/orders/projects | GET | 项目汇总 |
//! | /api/orders/{id} | GET | 订单详情 |
//! | /api/orders/{id}/status | PUT | 更新状态并回写外部系统 |

mod handler;

use axum::{
    Router,
    routing::{get, put},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list))
        .route("/stats", get(handler::stats))
        .route("/projects", get(handler::projects))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/status", put(handler::update_status))
}
