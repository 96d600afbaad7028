//! 集成测试共用的假数据源与状态构造

#![allow(dead_code)]

use async_trait::async_trait;
use fulfillment_server::sync::source::{
    OrderSource, SourceError, SourcePage, SourceResult, StatusUpdate,
};
use fulfillment_server::{Config, OrderStorage, ServerState};
use parking_lot::Mutex;
use serde_json::{Value, json};
use shared::order::SourceSystem;
use std::sync::Arc;
use tempfile::TempDir;

/// 可在测试过程中替换开放订单列表的假数据源
///
/// 回写的状态会体现在之后返回的记录里。
#[derive(Default)]
pub struct FakeSource {
    open_orders: Mutex<Vec<Value>>,
    details: Mutex<Vec<Value>>,
    pushes: Mutex<Vec<(String, StatusUpdate)>>,
    fail_with: Mutex<Option<SourceError>>,
}

impl FakeSource {
    pub fn new(open_orders: Vec<Value>) -> Arc<Self> {
        let source = Self::default();
        *source.open_orders.lock() = open_orders;
        Arc::new(source)
    }

    pub fn set_open_orders(&self, records: Vec<Value>) {
        *self.open_orders.lock() = records;
    }

    pub fn add_detail(&self, record: Value) {
        self.details.lock().push(record);
    }

    pub fn fail_next(&self, error: SourceError) {
        *self.fail_with.lock() = Some(error);
    }

    pub fn pushes(&self) -> Vec<(String, StatusUpdate)> {
        self.pushes.lock().clone()
    }
}

#[async_trait]
impl OrderSource for FakeSource {
    fn system(&self) -> SourceSystem {
        SourceSystem::NoBorder
    }

    async fn fetch_open_orders_page(&self, page: u32, page_size: u32) -> SourceResult<SourcePage> {
        if let Some(error) = self.fail_with.lock().take() {
            return Err(error);
        }
        let records = self.open_orders.lock().clone();
        let start = ((page.max(1) - 1) * page_size) as usize;
        let chunk: Vec<Value> = records
            .iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect();
        Ok(SourcePage {
            total_count: records.len() as u64,
            has_more: start + chunk.len() < records.len(),
            records: chunk,
        })
    }

    async fn fetch_order_detail(&self, external_id: &str) -> SourceResult<Value> {
        self.details
            .lock()
            .iter()
            .find(|r| r.get("id").and_then(Value::as_str) == Some(external_id))
            .cloned()
            .ok_or_else(|| SourceError::Http {
                status: 404,
                body: format!("order {external_id} not found"),
            })
    }

    async fn push_status(&self, external_id: &str, update: &StatusUpdate) -> SourceResult<()> {
        for records in [&self.open_orders, &self.details] {
            for record in records.lock().iter_mut() {
                if record.get("id").and_then(Value::as_str) == Some(external_id) {
                    record["status"] = json!(update.status);
                }
            }
        }
        self.pushes
            .lock()
            .push((external_id.to_string(), update.clone()));
        Ok(())
    }
}

/// 一行商品的外部订单记录
pub fn record(id: &str, doc: &str, created_at: &str, lines: &[(&str, &str, u32)]) -> Value {
    let items: Vec<Value> = lines
        .iter()
        .enumerate()
        .map(|(i, (sku, location, qty))| {
            json!({
                "id": format!("{id}-{i}"),
                "articleNumber": sku,
                "storageLocation": location,
                "quantity": qty,
            })
        })
        .collect();
    json!({
        "id": id,
        "documentNumber": doc,
        "status": "inFulfillment",
        "createdAt": created_at,
        "items": items,
    })
}

/// 基于临时目录中 redb 文件的服务器状态
pub fn state_with(source: Arc<FakeSource>, configure: impl FnOnce(&mut Config)) -> (ServerState, TempDir) {
    fulfillment_server::init_logger();

    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::with_overrides(dir.path().to_string_lossy(), 0);
    config.sync_page_size = 2;
    config.sync_page_delay_ms = 1;
    config.sync_enabled = false;
    configure(&mut config);

    config.ensure_work_dir_structure().unwrap();
    let storage = OrderStorage::open(config.database_path()).unwrap();
    (ServerState::with_source(config, storage, source), dir)
}
