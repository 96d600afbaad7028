//! 身份匹配：标准化订单 → 已存储订单

use shared::order::{NormalizedOrder, Order};

use crate::orders::storage::{OrderStorage, StorageResult};

/// 按固定优先级尝试候选标识符，第一个命中的订单胜出
///
/// 顺序：外部 ID → 单据号 → 外部订单号 → 客户订单号 → 发货单号
pub fn resolve(storage: &OrderStorage, normalized: &NormalizedOrder) -> StorageResult<Option<Order>> {
    let candidates = normalized.identifiers.candidates();
    if candidates.is_empty() {
        return Ok(None);
    }
    storage.find_by_any(&candidates)
}
