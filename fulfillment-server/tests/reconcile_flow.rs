//! 对账流程集成测试
//!
//! 假数据源 + 临时 redb 文件，完整走 ServerState 装配的服务

mod common;

use common::{FakeSource, record, state_with};
use fulfillment_server::batching::{CreateBatchRequest, PickRequest};
use fulfillment_server::orders::OrderFilter;
use fulfillment_server::sync::{SourceError, StatusPolicy, SyncRun};
use serde_json::json;
use shared::order::{OrderStatus, PickingStatus};
use shared::util::now_millis;

fn finished(run: SyncRun) -> fulfillment_server::sync::SyncReport {
    match run {
        SyncRun::Finished(report) => report,
        SyncRun::Skipped => panic!("expected a finished cycle"),
    }
}

#[tokio::test]
async fn test_paginated_import() {
    let source = FakeSource::new(vec![
        record("X1", "5001", "2024-03-01T08:00:00Z", &[("A1", "A01-01-01", 3)]),
        record("X2", "5002", "2024-03-01T09:00:00Z", &[("B2", "A01-02-01", 1)]),
        record("X3", "5003", "2024-03-01T10:00:00Z", &[("C3", "B02-01-01", 2)]),
    ]);
    let (state, _dir) = state_with(source, |_| {});

    let report = finished(state.reconciliation.run_sync().await);
    assert_eq!(report.pages, 2);
    assert_eq!(report.created, 3);
    assert_eq!(report.failed, 0);
    assert!(report.aborted.is_none());

    let orders = state.storage.list(&OrderFilter::default()).unwrap();
    assert_eq!(orders.len(), 3);
    let first = &orders[0];
    assert_eq!(first.identifiers.delivery_note_number.as_deref(), Some("5001"));
    assert_eq!(first.status, OrderStatus::New);
    assert_eq!(first.items[0].quantity, 3);
    assert_eq!(first.items[0].picked_quantity, 0);
    assert_eq!(first.items[0].picking_status, PickingStatus::Pending);

    let stats = state.reconciliation.stats();
    assert_eq!(stats.total_syncs, 1);
    assert_eq!(stats.successful_syncs, 1);
    assert!(stats.last_sync_at.is_some());
}

#[tokio::test]
async fn test_resync_is_idempotent() {
    let records = vec![
        record("X1", "5001", "2024-03-01T08:00:00Z", &[("A1", "A01-01-01", 3)]),
        record("X2", "5002", "2024-03-01T09:00:00Z", &[("B2", "A01-02-01", 1)]),
    ];
    let source = FakeSource::new(records);
    let (state, _dir) = state_with(source, |_| {});

    finished(state.reconciliation.run_sync().await);
    let before = state.storage.list(&OrderFilter::default()).unwrap();

    let report = finished(state.reconciliation.run_sync().await);
    assert_eq!(report.unchanged, 2);
    assert_eq!(report.created + report.updated, 0);
    assert_eq!(state.storage.list(&OrderFilter::default()).unwrap(), before);
}

#[tokio::test]
async fn test_resync_preserves_partial_pick() {
    let records = vec![record("X1", "5001", "2024-03-01T08:00:00Z", &[("A1", "A01-01-01", 3)])];
    let source = FakeSource::new(records.clone());
    let (state, _dir) = state_with(source.clone(), |c| c.status_policy = StatusPolicy::ForwardOnly);

    finished(state.reconciliation.run_sync().await);
    let batch = state
        .batches
        .create(CreateBatchRequest::default(), now_millis())
        .await
        .unwrap();
    state
        .batches
        .confirm_pick(
            &batch.id,
            PickRequest {
                line_index: None,
                quantity: 2,
                picker: Some("lena".into()),
            },
            now_millis(),
        )
        .unwrap();

    // 上游仍是 inFulfillment，并改了客户名
    let mut changed = records[0].clone();
    changed["salesOrder"] = json!({ "delivery": { "shippingAddress": { "name": "Neu GmbH" } } });
    source.set_open_orders(vec![changed]);

    let report = finished(state.reconciliation.run_sync().await);
    assert_eq!(report.updated, 1);

    let order = &state.storage.list(&OrderFilter::default()).unwrap()[0];
    assert_eq!(order.customer.name, "Neu GmbH");
    assert_eq!(order.status, OrderStatus::InProgress);
    assert_eq!(order.items[0].picked_quantity, 2);
    assert_eq!(order.items[0].picking_status, PickingStatus::Partial);
    assert_eq!(order.items[0].picked_by.as_deref(), Some("lena"));
    assert_eq!(order.batch.as_ref().map(|b| b.batch_id.as_str()), Some(batch.id.as_str()));
}

#[tokio::test]
async fn test_completed_batch_stays_packed_after_sync() {
    let source = FakeSource::new(vec![record("X1", "5001", "2024-03-01T08:00:00Z", &[("A1", "A01-01-01", 2)])]);
    let (state, _dir) = state_with(source.clone(), |_| {});
    finished(state.reconciliation.run_sync().await);

    let batch = state
        .batches
        .create(CreateBatchRequest::default(), now_millis())
        .await
        .unwrap();
    // 拣货中对账，订单仍留在批次里
    finished(state.reconciliation.run_sync().await);
    let order = &state.storage.list(&OrderFilter::default()).unwrap()[0];
    assert_eq!(order.status, OrderStatus::InProgress);
    assert!(order.batch.is_some());

    state
        .batches
        .confirm_pick(
            &batch.id,
            PickRequest {
                line_index: None,
                quantity: 2,
                picker: None,
            },
            now_millis(),
        )
        .unwrap();
    state.batches.complete(&batch.id, now_millis()).await.unwrap();
    let statuses: Vec<String> = source.pushes().into_iter().map(|(_, u)| u.status).collect();
    assert_eq!(statuses, vec!["processing", "processing"]);

    finished(state.reconciliation.run_sync().await);
    let order = &state.storage.list(&OrderFilter::default()).unwrap()[0];
    assert_eq!(order.status, OrderStatus::Packed);
    assert!(order.batch.is_none());
    assert!(state.batches.preview(now_millis()).unwrap().is_empty());
}

#[tokio::test]
async fn test_pick_after_resync_lands_on_same_product() {
    // 上游订单行没有 ID，本地按位置生成
    let line = |sku: &str, location: &str, qty: u32| {
        json!({ "articleNumber": sku, "storageLocation": location, "quantity": qty })
    };
    let mut original = record("X1", "5001", "2024-03-01T08:00:00Z", &[]);
    original["items"] = json!([line("A1", "A01-01-01", 2)]);
    let source = FakeSource::new(vec![original.clone()]);
    let (state, _dir) = state_with(source.clone(), |c| c.status_policy = StatusPolicy::ForwardOnly);
    finished(state.reconciliation.run_sync().await);

    let batch = state
        .batches
        .create(CreateBatchRequest::default(), now_millis())
        .await
        .unwrap();

    // 上游在前面补了一行，本地行数更少，整体替换
    let mut extended = original;
    extended["items"] = json!([line("C3", "B01-01-01", 5), line("A1", "A01-01-01", 2)]);
    source.set_open_orders(vec![extended]);
    finished(state.reconciliation.run_sync().await);

    let result = state
        .batches
        .confirm_pick(
            &batch.id,
            PickRequest {
                line_index: None,
                quantity: 2,
                picker: None,
            },
            now_millis(),
        )
        .unwrap();
    assert_eq!(result.outcome.allocated, 2);

    let order = &state.storage.list(&OrderFilter::default()).unwrap()[0];
    let c3 = order.items.iter().find(|i| i.sku == "C3").unwrap();
    let a1 = order.items.iter().find(|i| i.sku == "A1").unwrap();
    assert_eq!(c3.picked_quantity, 0);
    assert_eq!(a1.picked_quantity, 2);
    assert_eq!(a1.picking_status, PickingStatus::Complete);
}

#[tokio::test]
async fn test_malformed_record_is_skipped() {
    let source = FakeSource::new(vec![
        json!({ "status": "inFulfillment", "items": [{ "articleNumber": "A1", "quantity": 1 }] }),
        record("X2", "5002", "2024-03-01T09:00:00Z", &[("B2", "A01-02-01", 1)]),
    ]);
    let (state, _dir) = state_with(source, |_| {});

    let report = finished(state.reconciliation.run_sync().await);
    assert_eq!(report.failed, 1);
    assert_eq!(report.created, 1);
    assert!(report.aborted.is_none());
}

#[tokio::test]
async fn test_detail_fetch_fills_missing_items() {
    let source = FakeSource::new(vec![json!({
        "id": "X7",
        "documentNumber": "5007",
        "status": "inFulfillment",
    })]);
    source.add_detail(record("X7", "5007", "2024-03-01T08:00:00Z", &[("D4", "C01-01-01", 4)]));
    let (state, _dir) = state_with(source, |_| {});

    let report = finished(state.reconciliation.run_sync().await);
    assert_eq!(report.created, 1);
    let order = &state.storage.list(&OrderFilter::default()).unwrap()[0];
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].sku, "D4");
}

#[tokio::test]
async fn test_auth_failure_aborts_cycle() {
    let source = FakeSource::new(vec![record("X1", "5001", "2024-03-01T08:00:00Z", &[("A1", "A01-01-01", 3)])]);
    source.fail_next(SourceError::Auth("401 Unauthorized".into()));
    let (state, _dir) = state_with(source, |_| {});

    let report = finished(state.reconciliation.run_sync().await);
    assert!(report.aborted.is_some());
    assert_eq!(report.created, 0);
    assert_eq!(state.storage.count().unwrap(), 0);

    let stats = state.reconciliation.stats();
    assert_eq!(stats.failed_syncs, 1);
    assert!(stats.last_error.is_some());

    // 下一次触发正常执行
    let report = finished(state.reconciliation.run_sync().await);
    assert_eq!(report.created, 1);
}

#[tokio::test]
async fn test_status_update_pushes_to_source() {
    let source = FakeSource::new(vec![record("X1", "5001", "2024-03-01T08:00:00Z", &[("A1", "A01-01-01", 3)])]);
    let (state, _dir) = state_with(source.clone(), |_| {});
    finished(state.reconciliation.run_sync().await);
    let order = &state.storage.list(&OrderFilter::default()).unwrap()[0];

    let change = state
        .status
        .update_status(&order.id, OrderStatus::Shipped, vec!["TRK-1".into()], now_millis())
        .await
        .unwrap();
    assert!(change.pushed);
    assert!(change.order.shipped_at.is_some());

    let pushes = source.pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].0, "X1");
    assert_eq!(pushes[0].1.tracking_numbers, vec!["TRK-1".to_string()]);
}
