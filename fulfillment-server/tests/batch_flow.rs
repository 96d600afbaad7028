//! 批次拣货 HTTP 流程集成测试
//!
//! 在随机端口上启动完整路由，用 reqwest 驱动

mod common;

use common::{FakeSource, record, state_with};
use fulfillment_server::ServerState;
use fulfillment_server::orders::OrderFilter;
use reqwest::StatusCode;
use serde_json::{Value, json};
use shared::order::{OrderStatus, PickingStatus};

async fn serve(state: ServerState) -> String {
    let app = fulfillment_server::api::build_app(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn upstream() -> Vec<Value> {
    vec![
        record("X1", "5001", "2024-03-01T08:00:00Z", &[("B2", "A01-01-01", 2)]),
        record("X2", "5002", "2024-03-01T09:00:00Z", &[("B2", "A01-01-01", 3)]),
        record(
            "X3",
            "5003",
            "2024-03-01T10:00:00Z",
            &[("C3", "B02-01-01", 2), ("A1", "A01-02-01", 4)],
        ),
    ]
}

#[tokio::test]
async fn test_batch_pick_and_complete_over_http() {
    let source = FakeSource::new(upstream());
    let (state, _dir) = state_with(source, |_| {});
    let storage = state.storage.clone();
    let base = serve(state).await;
    let http = reqwest::Client::new();

    let health = http.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    assert!(health.headers().contains_key("x-request-id"));

    let sync: Value = http
        .post(format!("{base}/api/sync"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(sync["result"], "finished");
    assert_eq!(sync["created"], 3);

    let preview: Value = http
        .get(format!("{base}/api/batches/preview"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let categories: Vec<&str> = preview
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["category"].as_str().unwrap())
        .collect();
    assert_eq!(categories, vec!["single_item", "multi_item"]);

    let batch: Value = http
        .post(format!("{base}/api/batches"))
        .json(&json!({ "category": "single_item", "picker": "jonas" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let batch_id = batch["id"].as_str().unwrap().to_string();
    assert_eq!(batch["lines"].as_array().unwrap().len(), 1);
    assert_eq!(batch["lines"][0]["total_quantity"], 5);

    // 2 + 3 的合并行拣 4 件：先建的订单拣满，后建的拣 2/3
    let pick = http
        .post(format!("{base}/api/batches/{batch_id}/pick"))
        .json(&json!({ "quantity": 4 }))
        .send()
        .await
        .unwrap();
    assert_eq!(pick.status(), StatusCode::OK);
    let pick: Value = pick.json().await.unwrap();
    assert_eq!(pick["outcome"]["allocated"], 4);
    assert_eq!(pick["finished"], false);

    let orders = storage.list(&OrderFilter::by_batch(&batch_id)).unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].items[0].picking_status, PickingStatus::Complete);
    assert_eq!(orders[1].items[0].picked_quantity, 2);
    assert_eq!(orders[1].items[0].picking_status, PickingStatus::Partial);
    assert_eq!(orders[1].items[0].picked_by.as_deref(), Some("jonas"));

    let invalid = http
        .post(format!("{base}/api/batches/{batch_id}/pick"))
        .json(&json!({ "quantity": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = invalid.json().await.unwrap();
    assert_eq!(body["code"], "E0005");

    let report: Value = http
        .post(format!("{base}/api/batches/{batch_id}/complete"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report["order_count"], 2);
    assert_eq!(report["picked_items"], 4);
    assert_eq!(report["total_items"], 5);
    assert_eq!(report["pushed"], 2);

    let packed: Vec<Value> = http
        .get(format!("{base}/api/orders?status=packed"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(packed.len(), 2);
    assert!(packed.iter().all(|o| o["batch"].is_null()));

    // 再次对账后打包的订单不会回到待处理
    http.post(format!("{base}/api/sync")).send().await.unwrap();
    let packed: Vec<Value> = http
        .get(format!("{base}/api/orders?status=packed"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(packed.len(), 2);
    let preview: Value = http
        .get(format!("{base}/api/batches/preview"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(preview.as_array().unwrap().len(), 1);
    assert_eq!(preview[0]["category"], "multi_item");

    let gone = http
        .get(format!("{base}/api/batches/{batch_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_endpoints() {
    let source = FakeSource::new(upstream());
    let (state, _dir) = state_with(source.clone(), |_| {});
    let base = serve(state).await;
    let http = reqwest::Client::new();

    http.post(format!("{base}/api/sync")).send().await.unwrap();

    let bad = http
        .get(format!("{base}/api/orders?status=bogus"))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

    let orders: Vec<Value> = http
        .get(format!("{base}/api/orders?status=new"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(orders.len(), 3);
    let id = orders[0]["id"].as_str().unwrap();

    let change: Value = http
        .put(format!("{base}/api/orders/{id}/status"))
        .json(&json!({ "status": "shipped", "trackingNumbers": ["T-1"] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(change["pushed"], true);
    assert_eq!(change["order"]["status"], OrderStatus::Shipped.as_str());
    assert_eq!(source.pushes().len(), 1);

    let missing = http
        .get(format!("{base}/api/orders/does-not-exist"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let status: Value = http
        .get(format!("{base}/api/sync/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["total_syncs"], 1);
    assert_eq!(status["is_running"], false);
}
