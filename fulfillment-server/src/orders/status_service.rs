//! 订单状态变更与回写
//!
//! 先持久化本地状态，再回写外部系统。回写失败只记录日志，
//! 不会回滚本地变更（接受最终一致）。

use serde::Serialize;
use shared::order::status_map::to_external;
use shared::order::{Order, OrderStatus};
use std::sync::Arc;

use super::storage::{OrderStorage, StorageError};
use crate::sync::merge::StatusPolicy;
use crate::sync::source::{OrderSource, StatusUpdate};

/// 状态变更错误
#[derive(Debug, thiserror::Error)]
pub enum StatusChangeError {
    #[error("Order {order_id} cannot move back from {from} to {to}")]
    Backward {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// 状态变更结果
#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub order: Order,
    /// 外部系统是否已确认
    pub pushed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_error: Option<String>,
}

/// 状态变更服务
pub struct StatusService {
    storage: OrderStorage,
    source: Arc<dyn OrderSource>,
    policy: StatusPolicy,
}

impl StatusService {
    pub fn new(storage: OrderStorage, source: Arc<dyn OrderSource>, policy: StatusPolicy) -> Self {
        Self {
            storage,
            source,
            policy,
        }
    }

    /// 更新订单状态并回写外部系统
    ///
    /// `shipped` 会记录发货时间；追踪号非空时覆盖本地追踪号。
    pub async fn update_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        tracking_numbers: Vec<String>,
        now: i64,
    ) -> Result<StatusChange, StatusChangeError> {
        let mut order = self.storage.get_required(order_id)?;

        if self.policy.apply(order.status, status) != status {
            return Err(StatusChangeError::Backward {
                order_id: order.id,
                from: order.status,
                to: status,
            });
        }

        let expected = order.version;
        order.status = status;
        if status == OrderStatus::Shipped && order.shipped_at.is_none() {
            order.shipped_at = Some(now);
        }
        if !tracking_numbers.is_empty() {
            order.shipping.tracking_number = tracking_numbers.join(", ");
            order.shipping.has_tracking = true;
        }
        let order = self.storage.save_versioned(order, expected)?;
        tracing::info!(order_id = %order.id, status = %status, "Order status updated");

        let Some(external_id) = order.identifiers.external_id.clone() else {
            tracing::debug!(order_id = %order.id, "No external id, skipping status push");
            return Ok(StatusChange {
                order,
                pushed: false,
                push_error: None,
            });
        };

        let update = StatusUpdate {
            status: to_external(status, self.source.system()).to_string(),
            tracking_numbers,
        };
        match self.source.push_status(&external_id, &update).await {
            Ok(()) => Ok(StatusChange {
                order,
                pushed: true,
                push_error: None,
            }),
            Err(e) => {
                tracing::warn!(
                    order_id = %order.id,
                    external_id = %external_id,
                    error = %e,
                    "Status push failed, local change kept"
                );
                Ok(StatusChange {
                    order,
                    pushed: false,
                    push_error: Some(e.to_string()),
                })
            }
        }
    }
}
