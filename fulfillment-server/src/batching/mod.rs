//! 批次拣货引擎
//!
//! - [`classifier`]: 订单分类
//! - [`consolidator`]: 跨订单合并拣货行
//! - [`route`]: 按库位排序的拣货路线
//! - [`distributor`]: 拣货数量回分到各订单
//! - [`store`]: 内存中的活动批次
//! - [`service`]: 预览 / 创建 / 拣货 / 完成
//! - [`worker`]: 过期批次释放

pub mod classifier;
pub mod consolidator;
pub mod distributor;
pub mod route;
pub mod service;
pub mod store;
pub mod worker;

use crate::orders::storage::StorageError;

pub use classifier::{ClassifierConfig, classify};
pub use distributor::{Allocation, PickOutcome};
pub use service::{
    BatchConfig, BatchPreview, BatchReport, BatchService, CreateBatchRequest, PickRequest,
    PickResult,
};
pub use store::Batch;
pub use worker::BatchExpiryWorker;

/// 批次操作错误
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Batch {0} not found or expired")]
    NotFound(String),

    #[error("Batch {batch_id} has no line {index}")]
    LineNotFound { batch_id: String, index: usize },

    #[error("No eligible orders for batch")]
    NoOrders,

    #[error("Order {order_id} is not eligible for batching: {reason}")]
    OrderNotEligible { order_id: String, reason: String },

    #[error("Picked quantity must be greater than zero")]
    InvalidQuantity,

    #[error(transparent)]
    Storage(#[from] StorageError),
}
