//! 合并引擎
//!
//! 把标准化订单合并进已存储订单。外部系统拥有的字段被覆盖；
//! 本地状态（ID、创建时间、批次分配、版本号、拣货进度）永不丢失。
//!
//! # 订单行规则
//!
//! | 条件 | 行为 |
//! |------|------|
//! | 本地无行 或 本地行数 < 上游行数 | 用上游行替换，并按商品标识回填拣货进度 |
//! | 其他 | 本地行保持不变 |

use serde::{Deserialize, Serialize};
use shared::order::{NormalizedOrder, Order, OrderItem, OrderStatus};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

/// 上游状态与本地状态冲突时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPolicy {
    /// 上游为准；回退只记录告警
    #[default]
    Advisory,
    /// 不允许回退到更早的履约阶段
    ForwardOnly,
}

impl StatusPolicy {
    /// 计算 `current → requested` 后的实际状态
    pub fn apply(&self, current: OrderStatus, requested: OrderStatus) -> OrderStatus {
        match self {
            StatusPolicy::ForwardOnly if requested.is_backward_from(current) => current,
            _ => requested,
        }
    }
}

impl fmt::Display for StatusPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusPolicy::Advisory => write!(f, "advisory"),
            StatusPolicy::ForwardOnly => write!(f, "forward_only"),
        }
    }
}

impl FromStr for StatusPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "advisory" => Ok(StatusPolicy::Advisory),
            "forward_only" | "forward-only" | "forwardonly" => Ok(StatusPolicy::ForwardOnly),
            other => Err(format!("unknown status policy: {other}")),
        }
    }
}

/// 合并结果类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    Created,
    Updated,
    /// 与已存储订单完全一致，无需写入
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct MergeResult {
    pub order: Order,
    pub outcome: MergeOutcome,
}

/// 合并标准化订单与已存储订单
pub fn merge(
    normalized: NormalizedOrder,
    existing: Option<&Order>,
    now: i64,
    policy: StatusPolicy,
) -> MergeResult {
    let Some(existing) = existing else {
        return MergeResult {
            order: create(normalized, now),
            outcome: MergeOutcome::Created,
        };
    };

    let mut merged = existing.clone();

    let status = policy.apply(existing.status, normalized.status);
    if normalized.status.is_backward_from(existing.status) {
        tracing::warn!(
            order_id = %existing.id,
            delivery_note = %existing.identifiers.display_key(),
            local = %existing.status,
            upstream = %normalized.status,
            policy = %policy,
            "Upstream status moves order to an earlier stage"
        );
    }
    if status == OrderStatus::Shipped && merged.shipped_at.is_none() {
        merged.shipped_at = Some(now);
    }
    merged.status = status;

    merged.identifiers.fill_missing(&normalized.identifiers);
    merged.customer = normalized.customer;
    merged.shipping = normalized.shipping;
    merged.total = normalized.total;
    merged.net_sales = normalized.net_sales;
    merged.project = normalized.project;
    merged.priority = normalized.priority;
    if normalized.document_date.is_some() {
        merged.document_date = normalized.document_date;
    }

    if existing.items.is_empty() || existing.items.len() < normalized.items.len() {
        merged.items = carry_over_progress(&existing.items, normalized.items);
    }

    if merged == *existing {
        return MergeResult {
            order: merged,
            outcome: MergeOutcome::Unchanged,
        };
    }

    merged.updated_at = now;
    MergeResult {
        order: merged,
        outcome: MergeOutcome::Updated,
    }
}

fn create(normalized: NormalizedOrder, now: i64) -> Order {
    Order {
        id: uuid::Uuid::new_v4().to_string(),
        identifiers: normalized.identifiers,
        status: normalized.status,
        customer: normalized.customer,
        shipping: normalized.shipping,
        items: normalized.items,
        total: normalized.total,
        net_sales: normalized.net_sales,
        project: normalized.project,
        priority: normalized.priority,
        batch: None,
        document_date: normalized.document_date,
        shipped_at: (normalized.status == OrderStatus::Shipped).then_some(now),
        created_at: normalized.created_at.unwrap_or(now),
        updated_at: now,
        version: 0,
    }
}

/// 拣货进度快照
struct PickProgress {
    picked: u32,
    picked_by: Option<String>,
    picked_at: Option<i64>,
}

/// 按商品标识把旧行的拣货进度回填到新行
///
/// 同一商品出现多行时按出现顺序一一对应。
fn carry_over_progress(old: &[OrderItem], fresh: Vec<OrderItem>) -> Vec<OrderItem> {
    let mut progress: HashMap<&str, VecDeque<PickProgress>> = HashMap::new();
    for item in old.iter().filter(|i| i.picked_quantity > 0) {
        progress
            .entry(item.product_key())
            .or_default()
            .push_back(PickProgress {
                picked: item.picked_quantity,
                picked_by: item.picked_by.clone(),
                picked_at: item.picked_at,
            });
    }

    fresh
        .into_iter()
        .map(|mut item| {
            if let Some(state) = progress
                .get_mut(item.product_key())
                .and_then(VecDeque::pop_front)
            {
                item.set_picked(state.picked);
                item.picked_by = state.picked_by;
                item.picked_at = state.picked_at;
            }
            item
        })
        .collect()
}
