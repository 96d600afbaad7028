//! 订单领域模块
//!
//! - [`types`]: 订单、订单行、客户快照等值类型
//! - [`status`]: 内部订单状态与拣货状态
//! - [`status_map`]: 内部状态与外部履约系统状态互译
//! - [`identity`]: 候选标识符

pub mod identity;
pub mod status;
pub mod status_map;
pub mod types;

// Re-exports
pub use identity::{IdentifierField, OrderIdentifiers};
pub use status::{FulfillmentStage, OrderStatus, PickingStatus, UnknownStatus};
pub use status_map::SourceSystem;
pub use types::*;
