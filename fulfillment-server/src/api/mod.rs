//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`sync`] - 对账触发与调度状态
//! - [`orders`] - 订单查询、状态变更、项目汇总
//! - [`batches`] - 批次预览、创建、拣货、完成

pub mod batches;
pub mod health;
pub mod orders;
pub mod sync;

use axum::Router;
use axum::http::HeaderName;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

// Re-export common types for handlers
pub use crate::utils::{AppError, AppResult};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the Axum router (without state)
pub fn routes() -> Router<ServerState> {
    Router::<ServerState>::new()
        .merge(health::router())
        .merge(sync::router())
        .merge(orders::router())
        .merge(batches::router())
}

/// 绑定状态并加上 HTTP 中间件
pub fn build_app(state: ServerState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    routes()
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}
