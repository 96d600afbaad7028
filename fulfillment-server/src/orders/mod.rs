//! 本地订单账本
//!
//! - **storage**: redb 持久化（订单文档 + 标识符索引）
//! - **status_service**: 状态变更，本地优先、再回写外部系统
//! - **projects**: 按项目汇总
//!
//! # Data Flow
//!
//! ```text
//! SyncCycle ──merge──▶ OrderStorage ◀──apply_pick── BatchService
//!                          ▲
//!            StatusService ┘──push──▶ External API
//! ```

pub mod projects;
pub mod status_service;
pub mod storage;

pub use projects::ProjectSummary;
pub use status_service::{StatusChange, StatusChangeError, StatusService};
pub use storage::{OrderFilter, OrderStorage, StorageError, StorageResult, StorageStats};
