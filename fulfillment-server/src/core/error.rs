use thiserror::Error;

use crate::orders::StorageError;
use crate::sync::SourceError;

/// 服务器启动与运行错误
///
/// 请求级错误使用 [`crate::utils::AppError`]
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),

    #[error("外部系统错误: {0}")]
    Source(#[from] SourceError),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("内部服务器错误: {0}")]
    Internal(#[from] anyhow::Error),
}

/// 服务器 Result 类型别名
pub type Result<T> = std::result::Result<T, ServerError>;
