//! 订单状态与拣货状态

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 订单履约状态
///
/// 变体顺序即履约生命周期顺序：
/// `new < in_progress < packed < shipped < completed`，`cancelled` 为终态。
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// 待处理
    #[default]
    New,
    /// 拣货中
    InProgress,
    /// 已打包
    Packed,
    /// 已发货
    Shipped,
    /// 已完成
    Completed,
    /// 已取消
    Cancelled,
}

/// 履约阶段（粗粒度）
///
/// 不同外部系统的状态词汇粒度不一致，互译时只保证阶段不变。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStage {
    New,
    InProgress,
    Done,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::New,
        OrderStatus::InProgress,
        OrderStatus::Packed,
        OrderStatus::Shipped,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Packed => "packed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// 所属履约阶段
    pub fn stage(&self) -> FulfillmentStage {
        match self {
            OrderStatus::New => FulfillmentStage::New,
            OrderStatus::InProgress | OrderStatus::Packed => FulfillmentStage::InProgress,
            OrderStatus::Shipped | OrderStatus::Completed | OrderStatus::Cancelled => {
                FulfillmentStage::Done
            }
        }
    }

    /// 是否为回退（进入更早的阶段）
    pub fn is_backward_from(&self, current: OrderStatus) -> bool {
        self.stage() < current.stage()
    }

    /// 是否仍需仓库处理
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            OrderStatus::New | OrderStatus::InProgress | OrderStatus::Packed
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 无法识别的内部状态字符串
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// 行项目拣货状态 - 完全由数量推导
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PickingStatus {
    #[default]
    Pending,
    Partial,
    Complete,
}

impl PickingStatus {
    /// 由需求数量与已拣数量推导拣货状态
    pub fn derive(required: u32, picked: u32) -> Self {
        if picked == 0 {
            PickingStatus::Pending
        } else if picked < required {
            PickingStatus::Partial
        } else {
            PickingStatus::Complete
        }
    }
}
