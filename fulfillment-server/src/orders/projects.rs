//! 项目视图：按项目汇总订单

use serde::Serialize;
use shared::order::{Order, Priority};
use std::collections::BTreeMap;

/// 截止时间在此窗口内的订单视为紧急
const URGENT_WINDOW_MS: i64 = 2 * 60 * 60 * 1000;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectSummary {
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    pub total_orders: usize,
    /// 仍需仓库处理的订单数
    pub open_orders: usize,
    /// 按状态计数（键为状态字符串）
    pub by_status: BTreeMap<String, usize>,
    pub urgent_orders: usize,
    pub total_items: u32,
    pub last_activity: i64,
}

fn is_urgent(order: &Order, now: i64) -> bool {
    order.priority == Priority::High
        || order
            .shipping
            .deadline
            .is_some_and(|deadline| deadline - now <= URGENT_WINDOW_MS)
}

/// 汇总所有带项目标签的订单，按项目 ID 排序
pub fn summarize(orders: &[Order], now: i64) -> Vec<ProjectSummary> {
    let mut projects: BTreeMap<&str, ProjectSummary> = BTreeMap::new();

    for order in orders {
        let Some(project_id) = order.project.project_id.as_deref() else {
            continue;
        };
        let summary = projects.entry(project_id).or_insert_with(|| ProjectSummary {
            project_id: project_id.to_string(),
            ..Default::default()
        });

        if summary.project_name.is_none() {
            summary.project_name = order.project.project_name.clone();
        }
        summary.total_orders += 1;
        *summary
            .by_status
            .entry(order.status.as_str().to_string())
            .or_default() += 1;
        if order.status.is_open() {
            summary.open_orders += 1;
            if is_urgent(order, now) {
                summary.urgent_orders += 1;
            }
        }
        summary.total_items += order.total_quantity();
        summary.last_activity = summary.last_activity.max(order.updated_at);
    }

    projects.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{OrderItem, OrderStatus, ProjectTag};

    fn order(project: Option<&str>, status: OrderStatus, updated_at: i64) -> Order {
        Order {
            id: format!("o-{updated_at}"),
            identifiers: Default::default(),
            status,
            customer: Default::default(),
            shipping: Default::default(),
            items: vec![OrderItem::new("l1", "A1", 2)],
            total: Default::default(),
            net_sales: Default::default(),
            project: ProjectTag {
                project_id: project.map(str::to_string),
                ..Default::default()
            },
            priority: Priority::Normal,
            batch: None,
            document_date: None,
            shipped_at: None,
            created_at: 0,
            updated_at,
            version: 1,
        }
    }

    #[test]
    fn test_summary_groups_by_project() {
        let mut urgent = order(Some("P100"), OrderStatus::New, 30);
        urgent.shipping.deadline = Some(1_000 + 60_000);
        let orders = vec![
            order(Some("P100"), OrderStatus::New, 10),
            urgent,
            order(Some("P100"), OrderStatus::Shipped, 20),
            order(Some("P200"), OrderStatus::InProgress, 5),
            order(None, OrderStatus::New, 99),
        ];

        let summaries = summarize(&orders, 1_000);
        assert_eq!(summaries.len(), 2);
        let p100 = &summaries[0];
        assert_eq!(p100.project_id, "P100");
        assert_eq!(p100.total_orders, 3);
        assert_eq!(p100.by_status.get("new"), Some(&2));
        assert_eq!(p100.urgent_orders, 1);
        assert_eq!(p100.total_items, 6);
        assert_eq!(p100.last_activity, 30);
        assert_eq!(p100.open_orders, 2);
    }
}
