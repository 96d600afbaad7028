//! 对账编排
//!
//! 一次对账周期：
//!
//! 1. 按页拉取外部待履约订单（固定页大小，页间休眠）
//! 2. 逐条记录：标准化 → （列表无订单行时）补拉详情 → 身份匹配 → 合并 → 保存
//! 3. 汇总 created / updated / unchanged / failed
//!
//! 单条记录失败只计数并跳过；分页失败终止本周期并返回已累计的结果；
//! 认证失败立即终止。任何时刻最多只有一个周期在运行。

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use shared::order::status_map::is_outbound_form;
use shared::order::{NormalizedOrder, Order};
use shared::util::now_millis;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::identity;
use super::merge::{MergeOutcome, StatusPolicy, merge};
use super::normalizer::{NormalizeError, Normalizer, external_id, has_line_items};
use super::source::{OrderSource, SourceError};
use crate::orders::storage::{OrderStorage, StorageError};

/// 保存时版本冲突的最大重试次数
const MAX_SAVE_ATTEMPTS: u32 = 3;

/// 对账参数
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub page_size: u32,
    pub page_delay: Duration,
    pub status_policy: StatusPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: 50,
            page_delay: Duration::from_millis(200),
            status_policy: StatusPolicy::Advisory,
        }
    }
}

/// 单周期统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// 成功处理的记录数 (created + updated + unchanged)
    pub synced: u32,
    pub created: u32,
    pub updated: u32,
    pub unchanged: u32,
    pub failed: u32,
    pub pages: u32,
    /// 提前终止的原因
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
    pub started_at: i64,
    pub finished_at: i64,
}

impl SyncReport {
    fn tally(&mut self, outcome: MergeOutcome) {
        self.synced += 1;
        match outcome {
            MergeOutcome::Created => self.created += 1,
            MergeOutcome::Updated => self.updated += 1,
            MergeOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// 一次触发的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SyncRun {
    /// 已有周期在运行，本次触发被忽略
    Skipped,
    Finished(SyncReport),
}

/// 调度统计
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStats {
    pub total_syncs: u64,
    pub successful_syncs: u64,
    pub failed_syncs: u64,
    pub last_error: Option<String>,
    pub last_sync_at: Option<i64>,
    pub next_sync_at: Option<i64>,
    pub is_running: bool,
    pub last_report: Option<SyncReport>,
}

/// 单条记录错误
#[derive(Debug, thiserror::Error)]
enum RecordError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// 周期互斥守卫，drop 时释放
pub struct CycleGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// 对账服务
pub struct ReconciliationService {
    source: Arc<dyn OrderSource>,
    storage: OrderStorage,
    normalizer: Normalizer,
    options: SyncOptions,
    running: AtomicBool,
    stats: RwLock<SyncStats>,
}

impl std::fmt::Debug for ReconciliationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationService")
            .field("options", &self.options)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl ReconciliationService {
    pub fn new(
        source: Arc<dyn OrderSource>,
        storage: OrderStorage,
        normalizer: Normalizer,
        options: SyncOptions,
    ) -> Self {
        Self {
            source,
            storage,
            normalizer,
            options,
            running: AtomicBool::new(false),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    pub fn source(&self) -> &Arc<dyn OrderSource> {
        &self.source
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// 尝试占用周期；已有周期运行时返回 `None`
    pub fn try_begin_cycle(&self) -> Option<CycleGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleGuard {
                flag: &self.running,
            })
    }

    /// 调度统计快照
    pub fn stats(&self) -> SyncStats {
        let mut stats = self.stats.read().clone();
        stats.is_running = self.is_running();
        stats
    }

    /// 记录下一次计划运行时间（调度器调用）
    pub fn set_next_sync(&self, at: Option<i64>) {
        self.stats.write().next_sync_at = at;
    }

    /// 执行一次对账周期（手动触发与定时触发共用）
    pub async fn run_sync(&self) -> SyncRun {
        let Some(_guard) = self.try_begin_cycle() else {
            tracing::info!("Sync cycle already running, trigger ignored");
            return SyncRun::Skipped;
        };

        let report = self.run_cycle().await;

        {
            let mut stats = self.stats.write();
            stats.total_syncs += 1;
            stats.last_sync_at = Some(report.finished_at);
            match &report.aborted {
                Some(reason) => {
                    stats.failed_syncs += 1;
                    stats.last_error = Some(reason.clone());
                }
                None => stats.successful_syncs += 1,
            }
            stats.last_report = Some(report.clone());
        }

        SyncRun::Finished(report)
    }

    async fn run_cycle(&self) -> SyncReport {
        let mut report = SyncReport {
            started_at: now_millis(),
            ..Default::default()
        };
        tracing::info!(page_size = self.options.page_size, "Sync cycle started");

        let mut page_number = 1u32;
        'pages: loop {
            let page = match self
                .source
                .fetch_open_orders_page(page_number, self.options.page_size)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    if e.is_auth() {
                        tracing::error!(error = %e, "Sync aborted: authentication failed");
                    } else {
                        tracing::error!(page = page_number, error = %e, "Sync aborted: page fetch failed");
                    }
                    report.aborted = Some(e.to_string());
                    break;
                }
            };
            report.pages += 1;
            tracing::debug!(
                page = page_number,
                records = page.records.len(),
                total = page.total_count,
                "Fetched page"
            );

            for record in &page.records {
                match self.reconcile_record(record).await {
                    Ok(outcome) => report.tally(outcome),
                    Err(RecordError::Source(e)) if e.is_auth() => {
                        tracing::error!(error = %e, "Sync aborted: authentication failed");
                        report.aborted = Some(e.to_string());
                        break 'pages;
                    }
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!(
                            record = %record_label(record),
                            error = %e,
                            "Failed to reconcile record, skipping"
                        );
                    }
                }
            }

            if !page.has_more || page.records.is_empty() {
                break;
            }
            page_number += 1;
            tokio::time::sleep(self.options.page_delay).await;
        }

        report.finished_at = now_millis();
        tracing::info!(
            synced = report.synced,
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            failed = report.failed,
            pages = report.pages,
            aborted = report.aborted.is_some(),
            "Sync cycle finished"
        );
        report
    }

    async fn reconcile_record(&self, record: &Value) -> Result<MergeOutcome, RecordError> {
        let enriched;
        let record = if has_line_items(record) {
            record
        } else {
            enriched = self.with_detail(record).await?;
            &enriched
        };

        let normalized = self.normalizer.normalize(record)?;
        self.save_merged(normalized)
    }

    /// 列表记录缺少订单行时，用详情覆盖列表字段
    async fn with_detail(&self, record: &Value) -> Result<Value, SourceError> {
        let Some(id) = external_id(record) else {
            return Ok(record.clone());
        };
        match self.source.fetch_order_detail(&id).await {
            Ok(Value::Object(detail)) => {
                let mut merged = record.clone();
                if let Value::Object(fields) = &mut merged {
                    fields.extend(detail);
                }
                Ok(merged)
            }
            Ok(_) => Ok(record.clone()),
            Err(e) if e.is_auth() => Err(e),
            Err(e) => {
                tracing::warn!(external_id = %id, error = %e, "Detail fetch failed, using list payload");
                Ok(record.clone())
            }
        }
    }

    fn save_merged(&self, normalized: NormalizedOrder) -> Result<MergeOutcome, RecordError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let existing = identity::resolve(&self.storage, &normalized)?;
            let mut incoming = normalized.clone();
            // 上游只是回显本地推送过的状态时，保留更细的本地状态
            if let Some(order) = &existing
                && is_outbound_form(order.status, &incoming.external_status, self.normalizer.system())
            {
                incoming.status = order.status;
            }
            let result = merge(
                incoming,
                existing.as_ref(),
                now_millis(),
                self.options.status_policy,
            );
            if result.outcome == MergeOutcome::Unchanged {
                return Ok(result.outcome);
            }

            let expected = existing.as_ref().map(|o: &Order| o.version).unwrap_or(0);
            match self.storage.save_versioned(result.order, expected) {
                Ok(saved) => {
                    tracing::debug!(
                        order_id = %saved.id,
                        delivery_note = %saved.identifiers.display_key(),
                        outcome = ?result.outcome,
                        "Order reconciled"
                    );
                    return Ok(result.outcome);
                }
                Err(StorageError::VersionConflict { .. }) if attempt < MAX_SAVE_ATTEMPTS => {
                    tracing::debug!(attempt, "Version conflict while saving, re-resolving");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn record_label(record: &Value) -> String {
    ["documentNumber", "externalOrderNumber", "id"]
        .iter()
        .find_map(|key| record.get(*key))
        .map(|v| v.to_string())
        .unwrap_or_else(|| "<unknown>".into())
}
