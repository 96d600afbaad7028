//! 批次拣货服务
//!
//! | 操作 | 说明 |
//! |------|------|
//! | `preview` | 按分类汇总所有待处理订单 |
//! | `create` | 选定订单 → `in_progress` 并写入批次分配 |
//! | `confirm_pick` | 扫码确认数量，分配到各订单 |
//! | `complete` | 成员订单 → `packed`，清除批次分配，生成绩效报告 |
//! | `release_expired` | 过期批次的订单退回 `new` |
//!
//! 状态变化先写本地，再回写外部系统；回写失败只记录日志。
//! 否则下一次对账会把上游仍是"待履约"的订单退回 `new`。

use serde::{Deserialize, Serialize};
use shared::batch::{BatchCategory, BatchStats, ConsolidatedLine};
use shared::order::status_map::to_external;
use shared::order::{BatchAssignment, Order, OrderStatus};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::classifier::{ClassifierConfig, classify};
use super::consolidator::consolidate;
use super::distributor::{PickOutcome, apply_pick};
use super::route::{optimize, optimize_for_zone};
use super::store::{Batch, BatchStore, generate_batch_id};
use super::BatchError;
use crate::orders::storage::{OrderFilter, OrderStorage};
use crate::sync::source::{OrderSource, StatusUpdate};

/// 批次参数
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// 批次存活时间 (毫秒)
    pub ttl_ms: i64,
    pub classifier: ClassifierConfig,
    /// 项目 ID → 优先拣货区
    pub project_zones: HashMap<String, String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 8 * 60 * 60 * 1000,
            classifier: ClassifierConfig::default(),
            project_zones: HashMap::new(),
        }
    }
}

/// 单个分类的预览
#[derive(Debug, Clone, Serialize)]
pub struct BatchPreview {
    pub category: BatchCategory,
    pub label: &'static str,
    pub stats: BatchStats,
    pub order_ids: Vec<String>,
}

/// 创建批次请求
///
/// 指定 `order_ids` 时按指定订单建批；否则取 `category`（缺省为预览中第一个非空分类）
/// 下的待处理订单，最多 `limit` 个。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBatchRequest {
    #[serde(default)]
    pub category: Option<BatchCategory>,
    #[serde(default)]
    pub order_ids: Option<Vec<String>>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub picker: Option<String>,
    /// 优先拣货区；缺省时按项目映射推导
    #[serde(default)]
    pub zone: Option<String>,
}

/// 拣货确认请求
#[derive(Debug, Clone, Deserialize)]
pub struct PickRequest {
    /// 缺省为当前光标行
    #[serde(default)]
    pub line_index: Option<usize>,
    pub quantity: u32,
    #[serde(default)]
    pub picker: Option<String>,
}

/// 拣货确认结果
#[derive(Debug, Clone, Serialize)]
pub struct PickResult {
    pub outcome: PickOutcome,
    pub line: ConsolidatedLine,
    pub cursor: usize,
    pub finished: bool,
}

/// 批次完成报告
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: String,
    pub category: BatchCategory,
    pub order_count: usize,
    pub line_count: usize,
    pub total_items: u32,
    pub picked_items: u32,
    pub duration_secs: i64,
    pub items_per_minute: f64,
    pub completed_at: i64,
    /// 外部系统已确认 `packed` 的订单数
    pub pushed: usize,
}

/// 批次拣货服务
pub struct BatchService {
    storage: OrderStorage,
    source: Arc<dyn OrderSource>,
    store: BatchStore,
    config: BatchConfig,
}

impl BatchService {
    pub fn new(storage: OrderStorage, source: Arc<dyn OrderSource>, config: BatchConfig) -> Self {
        Self {
            storage,
            source,
            store: BatchStore::new(),
            config,
        }
    }

    /// 把本地状态回写到外部系统，返回成功条数
    async fn push_status(&self, orders: &[Order], status: OrderStatus) -> usize {
        let update = StatusUpdate {
            status: to_external(status, self.source.system()).to_string(),
            tracking_numbers: Vec::new(),
        };
        let mut pushed = 0;
        for order in orders {
            let Some(external_id) = order.identifiers.external_id.as_deref() else {
                continue;
            };
            match self.source.push_status(external_id, &update).await {
                Ok(()) => pushed += 1,
                Err(e) => tracing::warn!(
                    order_id = %order.id,
                    external_id,
                    status = %status,
                    error = %e,
                    "Status push failed, local change kept"
                ),
            }
        }
        pushed
    }

    /// 可建批订单：`new` 且未分配批次
    fn eligible_orders(&self) -> Result<Vec<Order>, BatchError> {
        let orders = self.storage.list(&OrderFilter::by_status(OrderStatus::New))?;
        Ok(orders.into_iter().filter(|o| o.batch.is_none()).collect())
    }

    fn group_by_category(&self, orders: Vec<Order>, now: i64) -> BTreeMap<BatchCategory, Vec<Order>> {
        let mut groups: BTreeMap<BatchCategory, Vec<Order>> = BTreeMap::new();
        for order in orders {
            let category = classify(&order, now, &self.config.classifier);
            groups.entry(category).or_default().push(order);
        }
        groups
    }

    /// 按分类预览待处理订单
    pub fn preview(&self, now: i64) -> Result<Vec<BatchPreview>, BatchError> {
        let mut groups = self.group_by_category(self.eligible_orders()?, now);

        Ok(BatchCategory::ALL
            .iter()
            .filter_map(|category| {
                let orders = groups.remove(category)?;
                let lines = consolidate(&orders);
                Some(BatchPreview {
                    category: *category,
                    label: category.label(),
                    stats: BatchStats::from_lines(*category, orders.len(), &lines),
                    order_ids: orders.into_iter().map(|o| o.id).collect(),
                })
            })
            .collect())
    }

    /// 创建批次
    pub async fn create(&self, request: CreateBatchRequest, now: i64) -> Result<Batch, BatchError> {
        let (category, members) = self.select_members(&request, now)?;
        if members.is_empty() {
            return Err(BatchError::NoOrders);
        }

        let batch_id = generate_batch_id(now);
        let sequence: HashMap<String, u32> = members
            .iter()
            .enumerate()
            .map(|(i, o)| (o.id.clone(), i as u32))
            .collect();
        let ids: Vec<String> = members.iter().map(|o| o.id.clone()).collect();

        let filter = OrderFilter {
            ids: Some(ids.clone()),
            statuses: Some(vec![OrderStatus::New]),
            ..Default::default()
        };
        let assigned = self.storage.update_many(&filter, |order| {
            order.status = OrderStatus::InProgress;
            order.batch = Some(BatchAssignment {
                batch_id: batch_id.clone(),
                category: category.as_str().to_string(),
                sequence: sequence.get(&order.id).copied().unwrap_or_default(),
                started_at: now,
            });
        })?;
        if assigned < ids.len() {
            tracing::warn!(
                batch_id = %batch_id,
                requested = ids.len(),
                assigned,
                "Some orders changed before batch assignment"
            );
        }

        // 以实际写入的成员为准
        let orders = self.storage.list(&OrderFilter::by_batch(&batch_id))?;
        if orders.is_empty() {
            return Err(BatchError::NoOrders);
        }

        let zone = request.zone.clone().or_else(|| self.zone_for(&orders));
        let lines = consolidate(&orders);
        let lines = match &zone {
            Some(zone) => optimize_for_zone(lines, zone),
            None => optimize(lines),
        };

        let mut batch = Batch {
            id: batch_id,
            category,
            order_ids: orders.iter().map(|o| o.id.clone()).collect(),
            lines,
            cursor: 0,
            picker: request.picker,
            zone,
            created_at: now,
            expires_at: now + self.config.ttl_ms,
        };
        batch.advance_cursor();

        tracing::info!(
            batch_id = %batch.id,
            category = %category,
            orders = batch.order_ids.len(),
            lines = batch.lines.len(),
            "Batch created"
        );
        self.store.insert(batch.clone());
        self.push_status(&orders, OrderStatus::InProgress).await;
        Ok(batch)
    }

    fn select_members(
        &self,
        request: &CreateBatchRequest,
        now: i64,
    ) -> Result<(BatchCategory, Vec<Order>), BatchError> {
        if let Some(ids) = &request.order_ids {
            let mut orders = Vec::with_capacity(ids.len());
            for id in ids {
                let order = self.storage.get_required(id)?;
                if order.status != OrderStatus::New {
                    return Err(BatchError::OrderNotEligible {
                        order_id: order.id,
                        reason: format!("status is {}", order.status),
                    });
                }
                if let Some(existing) = &order.batch {
                    return Err(BatchError::OrderNotEligible {
                        order_id: order.id.clone(),
                        reason: format!("already in batch {}", existing.batch_id),
                    });
                }
                orders.push(order);
            }
            orders.sort_by_key(|o| o.created_at);
            let category = match (request.category, orders.first()) {
                (Some(category), _) => category,
                (None, Some(first)) => classify(first, now, &self.config.classifier),
                (None, None) => return Err(BatchError::NoOrders),
            };
            return Ok((category, orders));
        }

        let mut groups = self.group_by_category(self.eligible_orders()?, now);
        let category = match request.category {
            Some(category) => category,
            None => BatchCategory::ALL
                .into_iter()
                .find(|c| groups.contains_key(c))
                .ok_or(BatchError::NoOrders)?,
        };
        let mut orders = groups.remove(&category).unwrap_or_default();
        if let Some(limit) = request.limit {
            orders.truncate(limit);
        }
        Ok((category, orders))
    }

    /// 全部成员属于同一已映射项目时返回该项目的拣货区
    fn zone_for(&self, orders: &[Order]) -> Option<String> {
        let first = orders.first()?.project.project_id.as_deref()?;
        orders
            .iter()
            .all(|o| o.project.project_id.as_deref() == Some(first))
            .then(|| self.config.project_zones.get(first).cloned())
            .flatten()
    }

    pub fn get(&self, batch_id: &str, now: i64) -> Result<Batch, BatchError> {
        self.store
            .get(batch_id, now)
            .ok_or_else(|| BatchError::NotFound(batch_id.to_string()))
    }

    pub fn list(&self, now: i64) -> Vec<Batch> {
        self.store.list(now)
    }

    /// 当前光标所在的拣货行
    pub fn current_line(&self, batch_id: &str, now: i64) -> Result<Option<ConsolidatedLine>, BatchError> {
        Ok(self.get(batch_id, now)?.current_line().cloned())
    }

    /// 确认拣货数量
    pub fn confirm_pick(
        &self,
        batch_id: &str,
        request: PickRequest,
        now: i64,
    ) -> Result<PickResult, BatchError> {
        if request.quantity == 0 {
            return Err(BatchError::InvalidQuantity);
        }
        let batch = self.get(batch_id, now)?;
        let index = request.line_index.unwrap_or(batch.cursor);
        let line = batch
            .lines
            .get(index)
            .cloned()
            .ok_or_else(|| BatchError::LineNotFound {
                batch_id: batch_id.to_string(),
                index,
            })?;
        let picker = request.picker.or(batch.picker);

        let outcome = apply_pick(&self.storage, &line, request.quantity, picker.as_deref(), now)?;

        let allocated = outcome.allocated;
        let (line, cursor, finished) = self
            .store
            .update(batch_id, now, |b| {
                let line = &mut b.lines[index];
                line.picked_quantity = (line.picked_quantity + allocated).min(line.total_quantity);
                let snapshot = line.clone();
                b.advance_cursor();
                (snapshot, b.cursor, b.is_finished())
            })
            .ok_or_else(|| BatchError::NotFound(batch_id.to_string()))?;

        tracing::debug!(
            batch_id = %batch_id,
            product = %line.product_key,
            allocated,
            unallocated = outcome.unallocated,
            "Pick confirmed"
        );
        Ok(PickResult {
            outcome,
            line,
            cursor,
            finished,
        })
    }

    /// 完成批次
    pub async fn complete(&self, batch_id: &str, now: i64) -> Result<BatchReport, BatchError> {
        let batch = self.get(batch_id, now)?;

        let members = self.storage.list(&OrderFilter::by_batch(batch_id))?;
        let packed = self
            .storage
            .update_many(&OrderFilter::by_batch(batch_id), |order| {
                order.status = OrderStatus::Packed;
                order.batch = None;
            })?;
        self.store.remove(batch_id);
        let pushed = self.push_status(&members, OrderStatus::Packed).await;

        let duration_ms = (now - batch.created_at).max(0);
        let picked_items = batch.picked_quantity();
        let minutes = duration_ms as f64 / 60_000.0;
        let report = BatchReport {
            batch_id: batch.id.clone(),
            category: batch.category,
            order_count: packed,
            line_count: batch.lines.len(),
            total_items: batch.total_quantity(),
            picked_items,
            duration_secs: duration_ms / 1000,
            items_per_minute: if minutes > 0.0 {
                f64::from(picked_items) / minutes
            } else {
                0.0
            },
            completed_at: now,
            pushed,
        };
        tracing::info!(
            batch_id = %report.batch_id,
            orders = report.order_count,
            picked = report.picked_items,
            total = report.total_items,
            duration_secs = report.duration_secs,
            "Batch completed"
        );
        Ok(report)
    }

    /// 丢弃过期批次，成员订单退回 `new`（已拣进度保留）
    pub async fn release_expired(&self, now: i64) -> Result<usize, BatchError> {
        let expired = self.store.take_expired(now);
        for batch in &expired {
            let members: Vec<Order> = self
                .storage
                .list(&OrderFilter::by_batch(&batch.id))?
                .into_iter()
                .filter(|o| o.status == OrderStatus::InProgress)
                .collect();
            let released = self
                .storage
                .update_many(&OrderFilter::by_batch(&batch.id), |order| {
                    if order.status == OrderStatus::InProgress {
                        order.status = OrderStatus::New;
                    }
                    order.batch = None;
                })?;
            self.push_status(&members, OrderStatus::New).await;
            tracing::info!(batch_id = %batch.id, released, "Expired batch released");
        }
        Ok(expired.len())
    }
}
