//! 外部履约系统数据源
//!
//! [`OrderSource`] 是对账引擎与外部 API 之间的接缝；
//! [`NoBorderClient`] 是 No Border REST API 的 reqwest 实现。
//!
//! # 端点
//!
//! | 操作 | 方法 | 路径 |
//! |------|------|------|
//! | 分页查询待履约订单 | POST | `/sales-orders/search` |
//! | 订单详情 | GET | `/sales-orders/{id}` |
//! | 状态回写 | PUT | `/sales-orders/{id}` |

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::{Value, json};
use shared::order::status_map::{is_ready_for_fulfillment, open_status};
use shared::order::SourceSystem;
use std::time::Duration;

/// 数据源错误
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// 认证失败 (401/403 或未配置凭据)，同一凭据不应重试
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// 超时、连接失败或 5xx
    #[error("Transient upstream failure: {0}")]
    Transient(String),

    /// 其他非成功状态码
    #[error("Upstream returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Failed to decode upstream response: {0}")]
    Decode(String),
}

impl SourceError {
    pub fn is_auth(&self) -> bool {
        matches!(self, SourceError::Auth(_))
    }

    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SourceError::Decode(e.to_string())
        } else {
            SourceError::Transient(e.to_string())
        }
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

/// 一页原始记录
#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    pub records: Vec<Value>,
    pub total_count: u64,
    pub has_more: bool,
}

/// 回写到外部系统的状态更新
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tracking_numbers: Vec<String>,
}

/// 连接测试结果
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub base_url: String,
    pub total_available: u64,
}

/// 外部订单数据源
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// 所属外部系统（决定状态词汇）
    fn system(&self) -> SourceSystem;

    /// 获取一页待履约订单（页码从 1 开始）
    async fn fetch_open_orders_page(&self, page: u32, page_size: u32) -> SourceResult<SourcePage>;

    /// 获取单个订单的完整记录
    async fn fetch_order_detail(&self, external_id: &str) -> SourceResult<Value>;

    /// 回写状态
    async fn push_status(&self, external_id: &str, update: &StatusUpdate) -> SourceResult<()>;

    /// 连接测试
    async fn test_connection(&self) -> SourceResult<ConnectionInfo> {
        let page = self.fetch_open_orders_page(1, 1).await?;
        Ok(ConnectionInfo {
            base_url: String::new(),
            total_available: page.total_count,
        })
    }
}

// ============================================================================
// No Border
// ============================================================================

/// 上游单页最大条数
const MAX_PAGE_LIMIT: u32 = 100;

/// No Border REST 客户端
pub struct NoBorderClient {
    client: Client,
    base_url: String,
    /// `Basic <base64>`；未配置凭据时为 `None`
    auth_header: Option<String>,
}

impl std::fmt::Debug for NoBorderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoBorderClient")
            .field("base_url", &self.base_url)
            .field("has_credentials", &self.auth_header.is_some())
            .finish()
    }
}

impl NoBorderClient {
    pub fn new(
        base_url: impl Into<String>,
        username: Option<&str>,
        password: Option<&str>,
        timeout: Duration,
    ) -> SourceResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Transient(format!("Failed to build HTTP client: {e}")))?;

        let auth_header = match (username, password) {
            (Some(user), Some(pass)) if !user.is_empty() => {
                Some(format!("Basic {}", STANDARD.encode(format!("{user}:{pass}"))))
            }
            _ => None,
        };

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_header,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn auth(&self) -> SourceResult<&str> {
        self.auth_header
            .as_deref()
            .ok_or_else(|| SourceError::Auth("No credentials configured".into()))
    }

    async fn check(response: reqwest::Response) -> SourceResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                SourceError::Auth(format!("{status}: {body}"))
            }
            s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
                SourceError::Transient(format!("{status}: {body}"))
            }
            s => SourceError::Http {
                status: s.as_u16(),
                body,
            },
        })
    }

    async fn search(&self, body: &Value) -> SourceResult<Value> {
        let url = format!("{}/sales-orders/search", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth()?)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(SourceError::from_reqwest)
    }

    fn status_filter(op: &str, value: Value, page: u32, limit: u32) -> Value {
        json!({
            "filters": [{ "key": "status", "op": op, "value": value }],
            "limit": limit,
            "page": page,
            "sort": [{ "key": "date", "order": "DESC" }],
        })
    }
}

/// 信封中的记录：`items` 或 `data`
fn envelope_records(body: &Value) -> Vec<Value> {
    ["items", "data"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_array))
        .cloned()
        .unwrap_or_default()
}

/// 信封中的总数：`extra.totalCount` / `meta.total` / `total`
fn envelope_total(body: &Value) -> Option<u64> {
    body.pointer("/extra/totalCount")
        .or_else(|| body.pointer("/meta/total"))
        .or_else(|| body.get("total"))
        .and_then(Value::as_u64)
}

/// 上游统计中仍处于待履约的数量
fn in_fulfillment_hint(body: &Value) -> u64 {
    body.pointer("/orders_by_status/inFulfillment")
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// 无过滤兜底查询的页大小：放大一倍以抵消本地筛除的记录
fn fallback_limit(page_size: u32) -> u32 {
    page_size.saturating_mul(2).min(MAX_PAGE_LIMIT)
}

fn build_page(records: Vec<Value>, total: Option<u64>, page: u32, page_size: u32) -> SourcePage {
    let has_more = match total {
        Some(total) => u64::from(page) * u64::from(page_size) < total,
        None => records.len() as u64 >= u64::from(page_size),
    };
    SourcePage {
        total_count: total.unwrap_or(records.len() as u64),
        records,
        has_more,
    }
}

#[async_trait]
impl OrderSource for NoBorderClient {
    fn system(&self) -> SourceSystem {
        SourceSystem::NoBorder
    }

    async fn fetch_open_orders_page(&self, page: u32, page_size: u32) -> SourceResult<SourcePage> {
        let open = open_status(SourceSystem::NoBorder);
        let body = self
            .search(&Self::status_filter("eq", json!(open), page, page_size))
            .await?;
        let records = envelope_records(&body);
        if !records.is_empty() {
            return Ok(build_page(records, envelope_total(&body), page, page_size));
        }

        let hint = in_fulfillment_hint(&body);
        if hint == 0 {
            return Ok(build_page(records, envelope_total(&body), page, page_size));
        }

        // 上游统计显示有待履约订单但 `eq` 过滤为空：先换 `in` 运算符重试
        tracing::warn!(
            hint,
            page,
            "Status filter returned no rows while upstream reports open orders, retrying with 'in'"
        );
        let retry = self
            .search(&Self::status_filter("in", json!([open]), page, page_size))
            .await?;
        let retry_records = envelope_records(&retry);
        if !retry_records.is_empty() {
            return Ok(build_page(retry_records, envelope_total(&retry), page, page_size));
        }

        // 最后一步：不带过滤取一页，在本地按状态筛选
        let limit = fallback_limit(page_size);
        let unfiltered = self
            .search(&json!({
                "limit": limit,
                "page": page,
                "sort": [{ "key": "date", "order": "DESC" }],
            }))
            .await?;
        let filtered: Vec<Value> = envelope_records(&unfiltered)
            .into_iter()
            .filter(|record| {
                record
                    .get("status")
                    .and_then(Value::as_str)
                    .is_some_and(is_ready_for_fulfillment)
            })
            .collect();
        tracing::info!(
            page,
            found = filtered.len(),
            "Client-side status filtering fallback"
        );
        Ok(build_page(filtered, Some(hint), page, page_size))
    }

    async fn fetch_order_detail(&self, external_id: &str) -> SourceResult<Value> {
        let url = format!("{}/sales-orders/{}", self.base_url, external_id);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth()?)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        let body: Value = Self::check(response)
            .await?
            .json()
            .await
            .map_err(SourceError::from_reqwest)?;

        // 部分版本把记录包在 `data` 里
        match body.get("data") {
            Some(inner) if inner.is_object() => Ok(inner.clone()),
            _ => Ok(body),
        }
    }

    async fn push_status(&self, external_id: &str, update: &StatusUpdate) -> SourceResult<()> {
        let url = format!("{}/sales-orders/{}", self.base_url, external_id);
        let response = self
            .client
            .put(&url)
            .header("Authorization", self.auth()?)
            .json(update)
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        Self::check(response).await?;
        Ok(())
    }

    async fn test_connection(&self) -> SourceResult<ConnectionInfo> {
        let page = self.fetch_open_orders_page(1, 1).await?;
        Ok(ConnectionInfo {
            base_url: self.base_url.clone(),
            total_available: page.total_count,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::routing::post;
    use axum::{Json, Router};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// 按顺序返回预置响应的上游，并记录收到的查询
    #[derive(Clone, Default)]
    struct Upstream {
        responses: Arc<Mutex<VecDeque<Value>>>,
        requests: Arc<Mutex<Vec<Value>>>,
    }

    impl Upstream {
        fn scripted(responses: Vec<Value>) -> Self {
            Self {
                responses: Arc::new(Mutex::new(responses.into())),
                requests: Arc::default(),
            }
        }

        /// 每次查询使用的过滤运算符；无过滤为 `None`
        fn ops(&self) -> Vec<Option<String>> {
            self.requests
                .lock()
                .iter()
                .map(|body| {
                    body.pointer("/filters/0/op")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .collect()
        }
    }

    async fn search(State(upstream): State<Upstream>, Json(body): Json<Value>) -> Json<Value> {
        upstream.requests.lock().push(body);
        let next = upstream.responses.lock().pop_front();
        Json(next.unwrap_or_else(|| json!({ "items": [] })))
    }

    async fn client_for(upstream: Upstream) -> NoBorderClient {
        let app = Router::new()
            .route("/sales-orders/search", post(search))
            .with_state(upstream);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        NoBorderClient::new(
            format!("http://{addr}"),
            Some("lager"),
            Some("secret"),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn empty_with_hint(hint: u64) -> Value {
        json!({ "items": [], "orders_by_status": { "inFulfillment": hint } })
    }

    #[tokio::test]
    async fn test_in_operator_retry() {
        let upstream = Upstream::scripted(vec![
            empty_with_hint(2),
            json!({
                "items": [{ "id": "X1", "status": "inFulfillment" }, { "id": "X2", "status": "inFulfillment" }],
                "extra": { "totalCount": 2 },
            }),
        ]);
        let client = client_for(upstream.clone()).await;

        let page = client.fetch_open_orders_page(1, 50).await.unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.total_count, 2);
        assert!(!page.has_more);
        assert_eq!(upstream.ops(), vec![Some("eq".into()), Some("in".into())]);
        assert_eq!(upstream.requests.lock()[1]["filters"][0]["value"], json!(["inFulfillment"]));
    }

    #[tokio::test]
    async fn test_client_side_filter_fallback() {
        let upstream = Upstream::scripted(vec![
            empty_with_hint(3),
            empty_with_hint(3),
            json!({
                "items": [
                    { "id": "X1", "status": "inFulfillment" },
                    { "id": "X2", "status": "shipped" },
                    { "id": "X3", "status": "processing" },
                    { "id": "X4" },
                ],
            }),
        ]);
        let client = client_for(upstream.clone()).await;

        let page = client.fetch_open_orders_page(1, 60).await.unwrap();
        let ids: Vec<&str> = page
            .records
            .iter()
            .filter_map(|r| r["id"].as_str())
            .collect();
        assert_eq!(ids, vec!["X1", "X3"]);
        assert_eq!(page.total_count, 3);
        assert_eq!(upstream.ops(), vec![Some("eq".into()), Some("in".into()), None]);
        // 无过滤查询放大页大小，但不超过上游上限
        assert_eq!(upstream.requests.lock()[2]["limit"], 100);
    }

    #[tokio::test]
    async fn test_data_envelope_without_fallback() {
        let upstream = Upstream::scripted(vec![json!({
            "data": [{ "id": "X9", "status": "inFulfillment" }],
            "meta": { "total": 51 },
        })]);
        let client = client_for(upstream.clone()).await;

        let page = client.fetch_open_orders_page(1, 50).await.unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.total_count, 51);
        assert!(page.has_more);
        assert_eq!(upstream.ops(), vec![Some("eq".into())]);
    }

    #[tokio::test]
    async fn test_empty_without_hint_is_final() {
        let upstream = Upstream::scripted(vec![json!({ "items": [], "total": 0 })]);
        let client = client_for(upstream.clone()).await;

        let page = client.fetch_open_orders_page(1, 50).await.unwrap();
        assert!(page.records.is_empty());
        assert_eq!(upstream.ops().len(), 1);
    }

    #[test]
    fn test_fallback_limit() {
        assert_eq!(fallback_limit(20), 40);
        assert_eq!(fallback_limit(80), MAX_PAGE_LIMIT);
        assert_eq!(fallback_limit(u32::MAX), MAX_PAGE_LIMIT);
    }

    #[test]
    fn test_envelope_records_items_or_data() {
        let a = json!({ "items": [{"id": 1}], "extra": { "totalCount": 7 } });
        assert_eq!(envelope_records(&a).len(), 1);
        assert_eq!(envelope_total(&a), Some(7));

        let b = json!({ "data": [{"id": 1}, {"id": 2}], "meta": { "total": 2 } });
        assert_eq!(envelope_records(&b).len(), 2);
        assert_eq!(envelope_total(&b), Some(2));

        let c = json!({ "total": 3 });
        assert!(envelope_records(&c).is_empty());
        assert_eq!(envelope_total(&c), Some(3));
    }

    #[test]
    fn test_has_more_from_total_or_page_fill() {
        let page = build_page(vec![json!({}); 50], Some(120), 2, 50);
        assert!(page.has_more);
        let last = build_page(vec![json!({}); 20], Some(120), 3, 50);
        assert!(!last.has_more);

        let unknown_full = build_page(vec![json!({}); 50], None, 1, 50);
        assert!(unknown_full.has_more);
        assert_eq!(unknown_full.total_count, 50);
    }

    #[test]
    fn test_status_filter_body() {
        let body = NoBorderClient::status_filter("eq", json!("inFulfillment"), 2, 50);
        assert_eq!(body["filters"][0]["key"], "status");
        assert_eq!(body["filters"][0]["op"], "eq");
        assert_eq!(body["page"], 2);
        assert_eq!(body["sort"][0]["order"], "DESC");
    }

    #[test]
    fn test_status_update_serialization() {
        let update = StatusUpdate {
            status: "shipped".into(),
            tracking_numbers: vec!["TRK1".into()],
        };
        let v = serde_json::to_value(&update).unwrap();
        assert_eq!(v, json!({ "status": "shipped", "trackingNumbers": ["TRK1"] }));

        let bare = StatusUpdate {
            status: "processing".into(),
            tracking_numbers: vec![],
        };
        assert_eq!(serde_json::to_value(&bare).unwrap(), json!({ "status": "processing" }));
    }

    #[test]
    fn test_missing_credentials_is_auth_error() {
        let client =
            NoBorderClient::new("https://api.example.test/", None, None, Duration::from_secs(1))
                .unwrap();
        assert_eq!(client.base_url(), "https://api.example.test");
        assert!(client.auth().unwrap_err().is_auth());
    }
}
