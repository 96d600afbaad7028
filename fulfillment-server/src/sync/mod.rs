//! 对账引擎 - 外部履约系统 → 本地订单账本
//!
//! - [`source`]: 外部数据源 (No Border REST)
//! - [`normalizer`]: 原始记录标准化
//! - [`identity`]: 多字段身份匹配
//! - [`merge`]: 字段级合并，保留拣货进度
//! - [`orchestrator`]: 分页对账周期
//! - [`worker`]: 定时调度

pub mod identity;
pub mod merge;
pub mod normalizer;
pub mod orchestrator;
pub mod source;
pub mod worker;

pub use merge::{MergeOutcome, MergeResult, StatusPolicy};
pub use normalizer::{NormalizeError, Normalizer};
pub use orchestrator::{ReconciliationService, SyncOptions, SyncReport, SyncRun, SyncStats};
pub use source::{NoBorderClient, OrderSource, SourceError, SourcePage, StatusUpdate};
pub use worker::SyncWorker;
