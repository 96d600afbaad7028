//! Batch API Module
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/batches | GET | 活动批次 |
//! | /api/batches | POST | 创建批次 |
//! | /api/batches/preview | GET | 按分类预览 |
//! | /api/batches/{id} | GET | 批次详情 |
//! | /api/batches/{id}/current | GET | 当前拣货行 |
//! | /api/batches/{id}/pick | POST | 确认拣货 |
//! | /api/batches/{id}/complete | POST | 完成批次 |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/batches", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/preview", get(handler::preview))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/current", get(handler::current_line))
        .route("/{id}/pick", post(handler::pick))
        .route("/{id}/complete", post(handler::complete))
}
