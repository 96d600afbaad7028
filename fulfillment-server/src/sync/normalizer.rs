//! 外部记录标准化
//!
//! 把外部 API 的原始 JSON 记录映射成 [`NormalizedOrder`]。
//! 松散类型的 `serde_json::Value` 只在本模块出现；
//! 所有可选路径缺失时退化为空串 / 0 / `None`，不会报错。
//!
//! 唯一的硬错误是记录没有任何候选标识符。

use regex::Regex;
use serde_json::Value;
use shared::order::status_map::to_internal;
use shared::order::{
    Customer, Money, NormalizedOrder, OrderIdentifiers, OrderItem, Priority, ProjectTag, Shipping,
    SourceSystem, DEFAULT_UNIT,
};
use std::sync::LazyLock;

/// 订单号中的项目前缀，如 `P100-2024-17`
static PROJECT_IN_ORDER_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^P(\d+)-").expect("valid project pattern"));

/// 标准化错误
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("Record is not a JSON object")]
    NotAnObject,

    #[error("Record has no identifiers")]
    MissingIdentifiers,
}

/// 外部记录标准化器
#[derive(Debug, Clone)]
pub struct Normalizer {
    system: SourceSystem,
    default_currency: String,
}

impl Normalizer {
    pub fn new(system: SourceSystem, default_currency: impl Into<String>) -> Self {
        Self {
            system,
            default_currency: default_currency.into(),
        }
    }

    pub fn system(&self) -> SourceSystem {
        self.system
    }

    /// 原始记录 → 标准化订单
    pub fn normalize(&self, record: &Value) -> Result<NormalizedOrder, NormalizeError> {
        if !record.is_object() {
            return Err(NormalizeError::NotAnObject);
        }

        let identifiers = extract_identifiers(record);
        if identifiers.is_empty() {
            return Err(NormalizeError::MissingIdentifiers);
        }

        let external_status = text(record, "/status").unwrap_or_default();
        let status = to_internal(&external_status, self.system);

        let items = positions(record)
            .map(|list| {
                list.iter()
                    .enumerate()
                    .map(|(index, position)| self.normalize_item(index, position))
                    .collect()
            })
            .unwrap_or_default();

        let total = first_of(record, &["/salesOrder/total", "/total"])
            .map(|v| self.money(v))
            .unwrap_or_else(|| Money::zero(&self.default_currency));
        let net_sales = first_of(record, &["/salesOrder/netSales", "/netSales"])
            .map(|v| self.money(v))
            .unwrap_or_else(|| Money::zero(&self.default_currency));

        let project = extract_project(record, order_number(record).as_deref());
        let priority = first_text(record, &["/priority", "/salesOrder/priority"])
            .and_then(|p| Priority::parse_loose(&p))
            .or(project.priority)
            .unwrap_or_default();

        Ok(NormalizedOrder {
            identifiers,
            status,
            external_status,
            customer: extract_customer(record),
            shipping: extract_shipping(record),
            items,
            total,
            net_sales,
            project,
            priority,
            document_date: first_of(record, &["/date", "/documentDate"]).and_then(timestamp),
            created_at: record.get("createdAt").and_then(timestamp),
        })
    }

    fn normalize_item(&self, index: usize, position: &Value) -> OrderItem {
        let line_id = text(position, "/id").unwrap_or_else(|| format!("item_{index}"));
        let sku = first_text(
            position,
            &["/product/number", "/sku", "/articleNumber", "/productCode"],
        )
        .unwrap_or_default();
        // 缺失或 0 都视为 1
        let quantity = first_of(position, &["/quantity", "/qty"])
            .and_then(number)
            .map(|q| q.max(0.0).round() as u32)
            .filter(|q| *q > 0)
            .unwrap_or(1);

        let mut item = OrderItem::new(line_id, sku, quantity);
        item.product_id = first_text(position, &["/product/id", "/productId"]);
        item.name =
            first_text(position, &["/product/name", "/name", "/productName"]).unwrap_or_default();
        item.description = first_text(
            position,
            &["/product/description", "/description", "/comment"],
        )
        .unwrap_or_else(|| item.name.clone());
        item.unit = text(position, "/unit").unwrap_or_else(|| DEFAULT_UNIT.to_string());

        let price = position
            .get("price")
            .map(|v| self.money(v))
            .unwrap_or_else(|| Money::zero(&self.default_currency));
        item.unit_price = price.amount;
        item.currency = price.currency;

        item.weight = first_of(position, &["/product/weight", "/weight"])
            .and_then(number)
            .filter(|w| *w > 0.0);
        item.ean = first_text(position, &["/product/ean", "/ean"]).unwrap_or_default();
        item.storage_location = first_text(
            position,
            &[
                "/storageLocation",
                "/storageLocationName",
                "/product/storageLocation",
            ],
        )
        .unwrap_or_default();
        item
    }

    /// `{amount, currency}` / 数字 / 数字字符串
    fn money(&self, value: &Value) -> Money {
        match value {
            Value::Object(_) => {
                let amount = value.get("amount").and_then(number).unwrap_or(0.0);
                let currency = text(value, "/currency").unwrap_or_else(|| self.default_currency.clone());
                Money::new(amount, currency)
            }
            other => Money::new(number(other).unwrap_or(0.0), &self.default_currency),
        }
    }
}

/// 列表接口的记录是否带有订单行（没有时需要补拉详情）
pub fn has_line_items(record: &Value) -> bool {
    positions(record).is_some_and(|list| !list.is_empty())
}

/// 外部系统 ID（用于详情拉取与状态回写）
pub fn external_id(record: &Value) -> Option<String> {
    text(record, "/id")
}

// ========== Extraction ==========

fn extract_identifiers(record: &Value) -> OrderIdentifiers {
    let external_id = text(record, "/id");
    let document_number = text(record, "/documentNumber");
    let external_order_number = text(record, "/externalOrderNumber");
    let customer_order_number = text(record, "/customerOrderNumber");
    let delivery_note_number = document_number
        .clone()
        .or_else(|| external_order_number.clone())
        .or_else(|| external_id.clone());

    OrderIdentifiers {
        external_id,
        document_number,
        external_order_number,
        customer_order_number,
        delivery_note_number,
    }
}

fn order_number(record: &Value) -> Option<String> {
    first_text(record, &["/externalOrderNumber", "/customerOrderNumber"])
}

fn extract_customer(record: &Value) -> Customer {
    let address = record
        .pointer("/salesOrder/delivery/shippingAddress")
        .unwrap_or(&Value::Null);
    let field = |path: &str| text(address, path).unwrap_or_default();

    Customer {
        id: text(record, "/salesOrder/customer/id").unwrap_or_default(),
        name: field("/name"),
        name2: field("/department"),
        street: field("/street"),
        zip: field("/zipCode"),
        city: field("/city"),
        country: field("/country"),
        email: text(record, "/salesOrder/delivery/email").unwrap_or_default(),
        phone: field("/phone"),
    }
}

fn extract_shipping(record: &Value) -> Shipping {
    let tracking: Vec<String> = record
        .get("trackingNumbers")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(scalar_text).collect())
        .unwrap_or_default();

    Shipping {
        method_id: text(record, "/salesOrder/delivery/shippingMethod/id").unwrap_or_default(),
        method_name: first_text(
            record,
            &[
                "/salesOrder/delivery/shippingMethod/name",
                "/shippingMethod/name",
            ],
        )
        .unwrap_or_default(),
        carrier: text(record, "/carrier").unwrap_or_default(),
        has_tracking: record
            .get("hasTracking")
            .and_then(Value::as_bool)
            .unwrap_or(!tracking.is_empty()),
        tracking_number: tracking.join(", "),
        deadline: first_of(
            record,
            &["/shippingDeadline", "/salesOrder/delivery/deadline", "/deadline"],
        )
        .and_then(timestamp),
    }
}

/// 项目标签：显式对象 → 自定义字段 → 标签 → 订单号前缀
fn extract_project(record: &Value, order_number: Option<&str>) -> ProjectTag {
    if let Some(project) = first_of(record, &["/project", "/salesOrder/project"])
        && project.is_object()
    {
        let tag = ProjectTag {
            project_id: first_text(project, &["/id", "/number"]),
            project_name: text(project, "/name"),
            priority: text(project, "/priority").and_then(|p| Priority::parse_loose(&p)),
        };
        if !tag.is_empty() {
            return tag;
        }
    }

    if let Some(custom) = record.pointer("/customFields/project") {
        let project_id = match custom {
            Value::Object(_) => text(custom, "/id"),
            other => scalar_text(other),
        };
        if project_id.is_some() {
            return ProjectTag {
                project_id,
                project_name: text(custom, "/name"),
                priority: None,
            };
        }
    }

    if let Some(id) = project_from_tags(record.get("tags")) {
        return ProjectTag {
            project_id: Some(id),
            ..Default::default()
        };
    }

    if let Some(number) = order_number
        && let Some(caps) = PROJECT_IN_ORDER_NUMBER.captures(number)
    {
        return ProjectTag {
            project_id: Some(format!("P{}", &caps[1])),
            ..Default::default()
        };
    }

    ProjectTag::default()
}

fn project_from_tags(tags: Option<&Value>) -> Option<String> {
    let entries: Vec<String> = match tags? {
        Value::String(s) => s.split(',').map(|t| t.trim().to_string()).collect(),
        Value::Array(list) => list.iter().filter_map(scalar_text).collect(),
        _ => return None,
    };
    entries.iter().find_map(|tag| {
        tag.strip_prefix("project:")
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    })
}

fn positions(record: &Value) -> Option<&Vec<Value>> {
    ["/salesOrder/positions", "/positions", "/items"]
        .iter()
        .find_map(|path| record.pointer(path).and_then(Value::as_array))
}

// ========== Value helpers ==========

fn first_of<'a>(value: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths
        .iter()
        .filter_map(|path| value.pointer(path))
        .find(|v| !v.is_null())
}

/// 字符串或数字转为非空字符串
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text(value: &Value, path: &str) -> Option<String> {
    value.pointer(path).and_then(scalar_text)
}

fn first_text(value: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|path| text(value, path))
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// RFC 3339 / `YYYY-MM-DD` / Unix millis → Unix millis
fn timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => {
            let s = s.trim();
            chrono::DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.timestamp_millis())
                .ok()
                .or_else(|| {
                    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                        .map(|dt| dt.and_utc().timestamp_millis())
                })
        }
        _ => None,
    }
}
