//! 活动批次存储
//!
//! 批次是派生的临时状态：只保存在内存中，过期后丢弃。
//! 订单本身仍是拣货进度的唯一事实来源。

use dashmap::DashMap;
use serde::Serialize;
use shared::batch::{BatchCategory, ConsolidatedLine};

/// 活动批次
#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    pub id: String,
    pub category: BatchCategory,
    pub order_ids: Vec<String>,
    /// 已按路线排序的合并拣货行
    pub lines: Vec<ConsolidatedLine>,
    /// 当前拣货行下标；等于 `lines.len()` 表示全部拣完
    pub cursor: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    pub created_at: i64,
    pub expires_at: i64,
}

impl Batch {
    pub fn current_line(&self) -> Option<&ConsolidatedLine> {
        self.lines.get(self.cursor)
    }

    pub fn is_finished(&self) -> bool {
        self.lines.iter().all(|l| l.outstanding() == 0)
    }

    pub fn total_quantity(&self) -> u32 {
        self.lines.iter().map(|l| l.total_quantity).sum()
    }

    pub fn picked_quantity(&self) -> u32 {
        self.lines.iter().map(|l| l.picked_quantity).sum()
    }

    /// 光标移到下一条仍有未拣数量的行
    pub fn advance_cursor(&mut self) {
        while self.cursor < self.lines.len() && self.lines[self.cursor].outstanding() == 0 {
            self.cursor += 1;
        }
    }
}

/// 生成批次 ID：`BATCH-{millis}-{9 位随机字符}`
pub fn generate_batch_id(now: i64) -> String {
    use rand::Rng;
    use rand::distributions::Alphanumeric;

    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|c| char::from(c).to_ascii_uppercase())
        .collect();
    format!("BATCH-{now}-{suffix}")
}

/// 按 ID 索引的活动批次，带过期时间
#[derive(Debug, Default)]
pub struct BatchStore {
    batches: DashMap<String, Batch>,
}

impl BatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, batch: Batch) {
        self.batches.insert(batch.id.clone(), batch);
    }

    /// 获取未过期的批次
    pub fn get(&self, id: &str, now: i64) -> Option<Batch> {
        self.batches
            .get(id)
            .filter(|b| b.expires_at > now)
            .map(|b| b.clone())
    }

    /// 原地修改未过期的批次
    pub fn update<R>(&self, id: &str, now: i64, f: impl FnOnce(&mut Batch) -> R) -> Option<R> {
        let mut entry = self.batches.get_mut(id)?;
        if entry.expires_at <= now {
            return None;
        }
        Some(f(entry.value_mut()))
    }

    pub fn remove(&self, id: &str) -> Option<Batch> {
        self.batches.remove(id).map(|(_, b)| b)
    }

    /// 移除所有已过期批次并返回它们
    pub fn take_expired(&self, now: i64) -> Vec<Batch> {
        let expired: Vec<String> = self
            .batches
            .iter()
            .filter(|entry| entry.expires_at <= now)
            .map(|entry| entry.key().clone())
            .collect();
        expired.iter().filter_map(|id| self.remove(id)).collect()
    }

    pub fn list(&self, now: i64) -> Vec<Batch> {
        let mut batches: Vec<Batch> = self
            .batches
            .iter()
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value().clone())
            .collect();
        batches.sort_by_key(|b| b.created_at);
        batches
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(id: &str, expires_at: i64) -> Batch {
        Batch {
            id: id.into(),
            category: BatchCategory::MultiItem,
            order_ids: vec![],
            lines: vec![],
            cursor: 0,
            picker: None,
            zone: None,
            created_at: 0,
            expires_at,
        }
    }

    #[test]
    fn test_batch_id_format() {
        let id = generate_batch_id(1700000000000);
        let parts: Vec<_> = id.split('-').collect();
        assert_eq!(parts[0], "BATCH");
        assert_eq!(parts[1], "1700000000000");
        assert_eq!(parts[2].len(), 9);
        assert_ne!(generate_batch_id(1), generate_batch_id(1));
    }

    #[test]
    fn test_expired_batches_are_invisible() {
        let store = BatchStore::new();
        store.insert(batch("b1", 100));
        assert!(store.get("b1", 50).is_some());
        assert!(store.get("b1", 100).is_none());
        assert!(store.update("b1", 150, |b| b.cursor = 1).is_none());
        assert_eq!(store.list(150).len(), 0);
    }

    #[test]
    fn test_take_expired() {
        let store = BatchStore::new();
        store.insert(batch("old", 100));
        store.insert(batch("fresh", 1000));
        let expired = store.take_expired(500);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, "old");
        assert_eq!(store.len(), 1);
    }
}
