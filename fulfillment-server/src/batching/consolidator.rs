//! 跨订单合并拣货单
//!
//! 以 `(商品标识, 库位)` 为键合并订单行。订单按创建时间从早到晚加入，
//! 因此每行的 `breakdown` 也是分配顺序。

use shared::batch::{ConsolidatedLine, OrderBreakdown};
use shared::order::Order;
use std::collections::HashMap;

/// 合并多个订单的订单行
///
/// 输出行按首次出现顺序排列；路线排序由 [`super::route`] 负责。
pub fn consolidate(orders: &[Order]) -> Vec<ConsolidatedLine> {
    let mut sorted: Vec<&Order> = orders.iter().collect();
    sorted.sort_by_key(|o| o.created_at);

    let mut lines: Vec<ConsolidatedLine> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for order in sorted {
        for item in &order.items {
            let key = (
                item.product_key().to_string(),
                item.storage_location.clone(),
            );
            let slot = *index.entry(key).or_insert_with(|| {
                lines.push(ConsolidatedLine {
                    product_key: item.product_key().to_string(),
                    sku: item.sku.clone(),
                    name: item.name.clone(),
                    unit: item.unit.clone(),
                    ean: item.ean.clone(),
                    storage_location: item.storage_location.clone(),
                    total_quantity: 0,
                    picked_quantity: 0,
                    unit_weight: item.weight,
                    breakdown: Vec::new(),
                });
                lines.len() - 1
            });

            let line = &mut lines[slot];
            line.total_quantity += item.quantity;
            line.picked_quantity += item.picked_quantity.min(item.quantity);
            line.breakdown.push(OrderBreakdown {
                order_id: order.id.clone(),
                line_id: item.line_id.clone(),
                delivery_note_number: order
                    .identifiers
                    .delivery_note_number
                    .clone()
                    .unwrap_or_default(),
                customer_name: order.customer.name.clone(),
                quantity: item.quantity,
            });
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{OrderIdentifiers, OrderItem, OrderStatus, Priority};

    fn order(id: &str, created_at: i64, items: Vec<OrderItem>) -> Order {
        Order {
            id: id.into(),
            identifiers: OrderIdentifiers {
                delivery_note_number: Some(format!("DN-{id}")),
                ..Default::default()
            },
            status: OrderStatus::New,
            customer: Default::default(),
            shipping: Default::default(),
            items,
            total: Default::default(),
            net_sales: Default::default(),
            project: Default::default(),
            priority: Priority::Normal,
            batch: None,
            document_date: None,
            shipped_at: None,
            created_at,
            updated_at: created_at,
            version: 1,
        }
    }

    fn at(sku: &str, location: &str, qty: u32) -> OrderItem {
        let mut item = OrderItem::new(format!("{sku}-{location}"), sku, qty);
        item.storage_location = location.into();
        item
    }

    #[test]
    fn test_merges_by_product_and_location() {
        let orders = vec![
            order("b", 20, vec![at("B2", "A01-01-01", 3), at("C3", "B01-01-01", 1)]),
            order("a", 10, vec![at("B2", "A01-01-01", 2)]),
            order("c", 30, vec![at("B2", "A02-01-01", 4)]),
        ];
        let lines = consolidate(&orders);
        assert_eq!(lines.len(), 3);

        let b2 = &lines[0];
        assert_eq!(b2.product_key, "B2");
        assert_eq!(b2.total_quantity, 5);
        // 最早创建的订单在前
        let owners: Vec<_> = b2.breakdown.iter().map(|b| b.order_id.as_str()).collect();
        assert_eq!(owners, vec!["a", "b"]);
        assert_eq!(b2.breakdown[0].delivery_note_number, "DN-a");

        // 同商品不同库位是不同的行
        assert_eq!(lines.iter().filter(|l| l.product_key == "B2").count(), 2);
    }

    #[test]
    fn test_quantity_conservation() {
        let orders = vec![
            order("a", 1, vec![at("A1", "A01-01-01", 3), at("B2", "A01-01-02", 1)]),
            order("b", 2, vec![at("A1", "A01-01-01", 7), at("A1", "A01-01-01", 2)]),
            order("c", 3, vec![at("C3", "", 5)]),
        ];
        let lines = consolidate(&orders);
        for line in &lines {
            assert_eq!(line.breakdown_total(), line.total_quantity);
        }
        let consolidated: u32 = lines.iter().map(|l| l.total_quantity).sum();
        let source: u32 = orders.iter().map(Order::total_quantity).sum();
        assert_eq!(consolidated, source);
    }

    #[test]
    fn test_existing_progress_is_summed() {
        let mut item = at("A1", "A01-01-01", 3);
        item.set_picked(2);
        let lines = consolidate(&[order("a", 1, vec![item]), order("b", 2, vec![at("A1", "A01-01-01", 1)])]);
        assert_eq!(lines[0].picked_quantity, 2);
        assert_eq!(lines[0].outstanding(), 2);
    }
}
