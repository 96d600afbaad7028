//! 拣货分配
//!
//! 把一次扫码确认的数量按 `breakdown` 顺序分配给各订单：
//! 每个订单分到 `min(剩余, 份额, 该行未拣数量)`，
//! 分不完的部分作为 `unallocated` 报告，不会超拣。
//!
//! 每个订单用乐观版本号写回，冲突时重新读取并重试。

use serde::Serialize;
use shared::batch::{ConsolidatedLine, OrderBreakdown};
use shared::order::{Order, OrderItem};

use crate::orders::storage::{OrderStorage, StorageError, StorageResult};

/// 版本冲突时的最大尝试次数
const MAX_ATTEMPTS: u32 = 3;

/// 单个订单分到的数量
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub order_id: String,
    pub line_id: String,
    pub quantity: u32,
}

/// 一次分配的结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PickOutcome {
    pub allocations: Vec<Allocation>,
    pub allocated: u32,
    pub unallocated: u32,
}

/// 按行 ID 查找订单行；行 ID 对不上商品标识 + 库位时按后者回退
///
/// 无上游行 ID 的订单行使用按位置生成的 ID，同步替换订单行后同一 ID 可能指向别的商品。
fn find_item<'a>(
    order: &'a mut Order,
    entry: &OrderBreakdown,
    line: &ConsolidatedLine,
) -> Option<&'a mut OrderItem> {
    let same_product = |i: &OrderItem| {
        i.product_key() == line.product_key && i.storage_location == line.storage_location
    };
    let by_id = order
        .items
        .iter()
        .position(|i| i.line_id == entry.line_id && same_product(i));
    let index = by_id.or_else(|| {
        order
            .items
            .iter()
            .position(|i| same_product(i) && i.outstanding() > 0)
    })?;
    order.items.get_mut(index)
}

/// 把 `confirmed` 件分配到合并行的各订单
pub fn apply_pick(
    storage: &OrderStorage,
    line: &ConsolidatedLine,
    confirmed: u32,
    picker: Option<&str>,
    now: i64,
) -> StorageResult<PickOutcome> {
    let mut outcome = PickOutcome::default();
    let mut remaining = confirmed;

    for entry in &line.breakdown {
        if remaining == 0 {
            break;
        }
        if let Some(allocation) = allocate_to_order(storage, entry, line, remaining, picker, now)? {
            remaining -= allocation.quantity;
            outcome.allocated += allocation.quantity;
            outcome.allocations.push(allocation);
        }
    }

    outcome.unallocated = remaining;
    if remaining > 0 {
        tracing::warn!(
            product = %line.product_key,
            location = %line.storage_location,
            confirmed,
            unallocated = remaining,
            "Picked quantity exceeds outstanding demand"
        );
    }
    Ok(outcome)
}

fn allocate_to_order(
    storage: &OrderStorage,
    entry: &OrderBreakdown,
    line: &ConsolidatedLine,
    remaining: u32,
    picker: Option<&str>,
    now: i64,
) -> StorageResult<Option<Allocation>> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let Some(mut order) = storage.get(&entry.order_id)? else {
            tracing::warn!(order_id = %entry.order_id, "Order in batch no longer exists");
            return Ok(None);
        };
        let expected = order.version;

        let Some(item) = find_item(&mut order, entry, line) else {
            tracing::warn!(
                order_id = %entry.order_id,
                line_id = %entry.line_id,
                "Order line not found for pick"
            );
            return Ok(None);
        };
        let line_id = item.line_id.clone();
        let share = remaining.min(entry.quantity).min(item.outstanding());
        if share == 0 {
            return Ok(None);
        }
        let applied = item.add_picked(share, picker, now);

        match storage.save_versioned(order, expected) {
            Ok(_) => {
                return Ok(Some(Allocation {
                    order_id: entry.order_id.clone(),
                    line_id,
                    quantity: applied,
                }));
            }
            Err(StorageError::VersionConflict { .. }) if attempt < MAX_ATTEMPTS => {
                tracing::debug!(order_id = %entry.order_id, attempt, "Version conflict on pick, retrying");
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batching::consolidator::consolidate;
    use shared::order::{OrderIdentifiers, OrderStatus, PickingStatus, Priority};

    fn order(id: &str, created_at: i64, qty: u32) -> Order {
        let mut item = OrderItem::new(format!("{id}-l1"), "B2", qty);
        item.storage_location = "A01-01-01".into();
        Order {
            id: id.into(),
            identifiers: OrderIdentifiers {
                delivery_note_number: Some(format!("DN-{id}")),
                ..Default::default()
            },
            status: OrderStatus::InProgress,
            customer: Default::default(),
            shipping: Default::default(),
            items: vec![item],
            total: Default::default(),
            net_sales: Default::default(),
            project: Default::default(),
            priority: Priority::Normal,
            batch: None,
            document_date: None,
            shipped_at: None,
            created_at,
            updated_at: created_at,
            version: 0,
        }
    }

    fn setup(orders: Vec<Order>) -> (OrderStorage, ConsolidatedLine) {
        let storage = OrderStorage::open_in_memory().unwrap();
        let saved: Vec<Order> = orders.into_iter().map(|o| storage.save(o).unwrap()).collect();
        let line = consolidate(&saved).remove(0);
        (storage, line)
    }

    #[test]
    fn test_pick_across_two_orders() {
        let (storage, line) = setup(vec![order("a", 1, 2), order("b", 2, 3)]);
        let outcome = apply_pick(&storage, &line, 4, Some("anna"), 100).unwrap();

        assert_eq!(outcome.allocated, 4);
        assert_eq!(outcome.unallocated, 0);
        assert_eq!(outcome.allocations[0].quantity, 2);
        assert_eq!(outcome.allocations[1].quantity, 2);

        let a = storage.get("a").unwrap().unwrap();
        assert_eq!(a.items[0].picked_quantity, 2);
        assert_eq!(a.items[0].picking_status, PickingStatus::Complete);
        assert_eq!(a.items[0].picked_by.as_deref(), Some("anna"));
        let b = storage.get("b").unwrap().unwrap();
        assert_eq!(b.items[0].picked_quantity, 2);
        assert_eq!(b.items[0].picking_status, PickingStatus::Partial);
    }

    #[test]
    fn test_distribution_conservation_and_overpick() {
        let (storage, line) = setup(vec![order("a", 1, 2), order("b", 2, 3)]);
        let outcome = apply_pick(&storage, &line, 9, None, 100).unwrap();
        assert_eq!(outcome.allocated + outcome.unallocated, 9);
        assert_eq!(outcome.allocated, 5);
        assert_eq!(outcome.unallocated, 4);

        // 全部拣完后再确认，不会超拣
        let again = apply_pick(&storage, &line, 1, None, 101).unwrap();
        assert_eq!(again.allocated, 0);
        assert_eq!(again.unallocated, 1);
        let b = storage.get("b").unwrap().unwrap();
        assert_eq!(b.items[0].picked_quantity, 3);
    }

    #[test]
    fn test_partial_progress_respected() {
        let mut first = order("a", 1, 2);
        first.items[0].set_picked(1);
        let (storage, line) = setup(vec![first, order("b", 2, 3)]);

        let outcome = apply_pick(&storage, &line, 2, None, 100).unwrap();
        let shares: Vec<_> = outcome.allocations.iter().map(|a| a.quantity).collect();
        assert_eq!(shares, vec![1, 1]);
    }

    #[test]
    fn test_falls_back_to_product_key_when_line_id_changed() {
        let (storage, line) = setup(vec![order("a", 1, 2)]);
        // 同步替换了订单行，行 ID 变了
        let mut a = storage.get("a").unwrap().unwrap();
        a.items[0].line_id = "pos-77".into();
        storage.save(a).unwrap();

        let outcome = apply_pick(&storage, &line, 2, None, 100).unwrap();
        assert_eq!(outcome.allocated, 2);
    }

    #[test]
    fn test_reused_line_id_does_not_credit_other_product() {
        let (storage, line) = setup(vec![order("a", 1, 2)]);
        // 同步后上游在前面插入了新行，旧行 ID 现在指向另一个商品
        let mut a = storage.get("a").unwrap().unwrap();
        let mut inserted = OrderItem::new("a-l1", "C3", 5);
        inserted.storage_location = "B01-01-01".into();
        let mut moved = a.items.remove(0);
        moved.line_id = "a-l2".into();
        a.items = vec![inserted, moved];
        storage.save(a).unwrap();

        let outcome = apply_pick(&storage, &line, 2, None, 100).unwrap();
        assert_eq!(outcome.allocated, 2);
        assert_eq!(outcome.allocations[0].line_id, "a-l2");

        let a = storage.get("a").unwrap().unwrap();
        assert_eq!(a.items[0].sku, "C3");
        assert_eq!(a.items[0].picked_quantity, 0);
        assert_eq!(a.items[1].picked_quantity, 2);
        assert_eq!(a.items[1].picking_status, PickingStatus::Complete);
    }

    #[test]
    fn test_missing_order_is_skipped() {
        let (storage, line) = setup(vec![order("a", 1, 2), order("b", 2, 3)]);
        storage.remove("a").unwrap();
        let outcome = apply_pick(&storage, &line, 3, None, 100).unwrap();
        assert_eq!(outcome.allocations.len(), 1);
        assert_eq!(outcome.allocations[0].order_id, "b");
        assert_eq!(outcome.allocated, 3);
    }
}
