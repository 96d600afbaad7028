//! 统一错误处理
//!
//! 提供应用级错误类型和响应结构：
//! - [`AppError`] - 应用错误枚举
//! - [`AppResponse`] - 错误响应结构
//!
//! # 错误码规范
//!
//! | 前缀 | 分类 | 示例 |
//! |------|------|------|
//! | E0xxx | 业务错误 | E0003 资源不存在 |
//! | E4xxx | 上游系统错误 | E4002 外部履约系统请求失败 |
//! | E9xxx | 系统错误 | E9002 数据库错误 |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::batching::BatchError;
use crate::orders::StatusChangeError;
use crate::orders::storage::StorageError;
use crate::sync::source::SourceError;

/// API 统一响应结构
///
/// ```json
/// {
///   "code": "E0000",
///   "message": "Success",
///   "data": { ... }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct AppResponse<T> {
    /// 错误码 (E0000 表示成功)
    pub code: String,
    /// 消息
    pub message: String,
    /// 响应数据
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// 应用错误枚举
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== 业务逻辑错误 (4xx) ==========
    #[error("Resource not found: {0}")]
    /// 资源不存在 (404)
    NotFound(String),

    #[error("Resource conflict: {0}")]
    /// 资源冲突 (409)
    Conflict(String),

    #[error("Validation failed: {0}")]
    /// 验证失败 (400)
    Validation(String),

    #[error("Business rule violation: {0}")]
    /// 业务规则违反 (422)
    BusinessRule(String),

    // ========== 上游错误 (5xx) ==========
    #[error("Upstream error: {0}")]
    /// 外部履约系统错误 (502)
    Upstream(String),

    // ========== 系统错误 (5xx) ==========
    #[error("Database error: {0}")]
    /// 数据库错误 (500)
    Database(String),
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "E0003", msg.as_str()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "E0004", msg.as_str()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "E0002", msg.as_str()),
            AppError::BusinessRule(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "E0005", msg.as_str())
            }
            AppError::Upstream(msg) => {
                tracing::warn!(target: "upstream", error = %msg, "Upstream error");
                (StatusCode::BAD_GATEWAY, "E4002", msg.as_str())
            }
            AppError::Database(msg) => {
                error!(target: "database", error = %msg, "Database error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "E9002",
                    "Database operation failed",
                )
            }
        };

        let body = Json(AppResponse::<()> {
            code: code.to_string(),
            message: message.to_string(),
            data: None,
        });

        (status, body).into_response()
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::OrderNotFound(id) => AppError::NotFound(format!("Order {id} not found")),
            StorageError::DuplicateIdentifier { .. } | StorageError::VersionConflict { .. } => {
                AppError::Conflict(e.to_string())
            }
            other => AppError::Database(other.to_string()),
        }
    }
}

impl From<SourceError> for AppError {
    fn from(e: SourceError) -> Self {
        AppError::Upstream(e.to_string())
    }
}

impl From<BatchError> for AppError {
    fn from(e: BatchError) -> Self {
        match e {
            BatchError::NotFound(_) | BatchError::LineNotFound { .. } => {
                AppError::NotFound(e.to_string())
            }
            BatchError::NoOrders
            | BatchError::OrderNotEligible { .. }
            | BatchError::InvalidQuantity => AppError::BusinessRule(e.to_string()),
            BatchError::Storage(inner) => inner.into(),
        }
    }
}

impl From<StatusChangeError> for AppError {
    fn from(e: StatusChangeError) -> Self {
        match e {
            StatusChangeError::Backward { .. } => AppError::BusinessRule(e.to_string()),
            StatusChangeError::Storage(inner) => inner.into(),
        }
    }
}

/// Application-level Result type
pub type AppResult<T> = Result<T, AppError>;
