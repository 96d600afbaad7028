//! 订单领域类型
//!
//! [`Order`] 是拣货进度的唯一事实来源。批次、合并拣货单等都是
//! 按需计算出来的视图，不持久化。

use serde::{Deserialize, Serialize};

use super::identity::OrderIdentifiers;
use super::status::{OrderStatus, PickingStatus};

/// 本地默认币种
pub const DEFAULT_CURRENCY: &str = "EUR";

/// 默认计量单位（件）
pub const DEFAULT_UNIT: &str = "Stk";

// ============================================================================
// Value Types
// ============================================================================

/// 金额 + 币种
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Money {
    pub amount: f64,
    pub currency: String,
}

impl Money {
    pub fn new(amount: f64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    pub fn zero(currency: impl Into<String>) -> Self {
        Self::new(0.0, currency)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero(DEFAULT_CURRENCY)
    }
}

/// 订单优先级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    /// 宽松解析：`high` / `urgent` / `express` / `1` 视为高优先级
    pub fn parse_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" | "urgent" | "express" | "1" => Some(Priority::High),
            "normal" | "medium" | "2" => Some(Priority::Normal),
            "low" | "3" => Some(Priority::Low),
            _ => None,
        }
    }
}

/// 项目标签
///
/// 没有任何项目信号时三个字段全部为 `None`。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ProjectTag {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl ProjectTag {
    pub fn is_empty(&self) -> bool {
        self.project_id.is_none() && self.project_name.is_none() && self.priority.is_none()
    }
}

/// 客户快照（同步时复制，不是引用）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Customer {
    pub id: String,
    pub name: String,
    /// 部门 / 地址第二行
    pub name2: String,
    pub street: String,
    pub zip: String,
    pub city: String,
    pub country: String,
    pub email: String,
    pub phone: String,
}

/// 发货信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Shipping {
    /// 发货方式 ID
    pub method_id: String,
    /// 发货方式名称（分类器用于识别 express）
    pub method_name: String,
    pub carrier: String,
    /// 多个追踪号以 `, ` 拼接
    pub tracking_number: String,
    pub has_tracking: bool,
    /// 发货截止时间 (Unix millis)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<i64>,
}

/// 批次分配（临时字段，批次完成时清空）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchAssignment {
    pub batch_id: String,
    /// 批次分类标签 (express / single_item / bulky / multi_item)
    pub category: String,
    /// 订单在批次内的序号
    pub sequence: u32,
    pub started_at: i64,
}

// ============================================================================
// Order Item
// ============================================================================

/// 订单行
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    /// 行 ID（外部 position id，缺失时为 `item_{index}`）
    pub line_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    /// SKU / 商品编号 - 合并拣货主键
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub unit: String,
    pub unit_price: f64,
    pub currency: String,
    /// 单件重量 (kg)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default)]
    pub ean: String,
    /// 库位，格式 `Zone Aisle-Rack-Level`，如 `A01-02-03`
    #[serde(default)]
    pub storage_location: String,
    /// 需求数量
    pub quantity: u32,
    /// 已拣数量，满足 `0 <= picked <= quantity`
    #[serde(default)]
    pub picked_quantity: u32,
    #[serde(default)]
    pub picking_status: PickingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picked_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picked_at: Option<i64>,
}

impl OrderItem {
    /// 新建一个未拣货的订单行
    pub fn new(line_id: impl Into<String>, sku: impl Into<String>, quantity: u32) -> Self {
        Self {
            line_id: line_id.into(),
            product_id: None,
            sku: sku.into(),
            name: String::new(),
            description: String::new(),
            unit: DEFAULT_UNIT.to_string(),
            unit_price: 0.0,
            currency: DEFAULT_CURRENCY.to_string(),
            weight: None,
            ean: String::new(),
            storage_location: String::new(),
            quantity,
            picked_quantity: 0,
            picking_status: PickingStatus::Pending,
            picked_by: None,
            picked_at: None,
        }
    }

    /// 商品标识：SKU → 商品 ID → 名称
    pub fn product_key(&self) -> &str {
        if !self.sku.is_empty() {
            &self.sku
        } else if let Some(id) = self.product_id.as_deref().filter(|id| !id.is_empty()) {
            id
        } else {
            &self.name
        }
    }

    /// 尚未拣取的数量
    pub fn outstanding(&self) -> u32 {
        self.quantity.saturating_sub(self.picked_quantity)
    }

    /// 本行总重量 (kg)
    pub fn line_weight(&self) -> f64 {
        self.weight.unwrap_or(0.0) * f64::from(self.quantity)
    }

    /// 设置已拣数量（钳制到需求数量）并重新推导状态
    pub fn set_picked(&mut self, picked: u32) {
        self.picked_quantity = picked.min(self.quantity);
        self.picking_status = PickingStatus::derive(self.quantity, self.picked_quantity);
    }

    /// 增加已拣数量，返回实际记入的数量
    pub fn add_picked(&mut self, amount: u32, picker: Option<&str>, at: i64) -> u32 {
        let applied = amount.min(self.outstanding());
        if applied > 0 {
            self.set_picked(self.picked_quantity + applied);
            self.picked_by = picker.map(str::to_string);
            self.picked_at = Some(at);
        }
        applied
    }
}

// ============================================================================
// Order
// ============================================================================

/// 订单（履约工作单元）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    /// 本地 ID (UUID)
    pub id: String,
    /// 候选标识符
    pub identifiers: OrderIdentifiers,
    pub status: OrderStatus,
    pub customer: Customer,
    pub shipping: Shipping,
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub net_sales: Money,
    #[serde(default)]
    pub project: ProjectTag,
    #[serde(default)]
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<BatchAssignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipped_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    /// 乐观并发版本号，每次持久化递增
    #[serde(default)]
    pub version: u64,
}

impl Order {
    /// 总件数
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// 总重量 (kg)
    pub fn total_weight(&self) -> f64 {
        self.items.iter().map(OrderItem::line_weight).sum()
    }

    /// 不同商品的行数
    pub fn distinct_products(&self) -> usize {
        let mut keys: Vec<&str> = self.items.iter().map(OrderItem::product_key).collect();
        keys.sort_unstable();
        keys.dedup();
        keys.len()
    }

    /// 所有行均已拣完
    pub fn is_fully_picked(&self) -> bool {
        !self.items.is_empty()
            && self
                .items
                .iter()
                .all(|i| i.picking_status == PickingStatus::Complete)
    }
}

/// 外部记录标准化后的订单
///
/// 只包含外部系统拥有的字段；本地 ID、版本、批次等由合并引擎补齐。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedOrder {
    pub identifiers: OrderIdentifiers,
    pub status: OrderStatus,
    /// 原始外部状态（日志与调试）
    pub external_status: String,
    pub customer: Customer,
    pub shipping: Shipping,
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub net_sales: Money,
    pub project: ProjectTag,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_picked_clamps_to_outstanding() {
        let mut item = OrderItem::new("l1", "A1", 3);
        assert_eq!(item.add_picked(2, Some("anna"), 10), 2);
        assert_eq!(item.picking_status, PickingStatus::Partial);
        assert_eq!(item.add_picked(5, Some("anna"), 11), 1);
        assert_eq!(item.picked_quantity, 3);
        assert_eq!(item.picking_status, PickingStatus::Complete);
        assert_eq!(item.add_picked(1, None, 12), 0);
        assert_eq!(item.picked_at, Some(11));
    }

    #[test]
    fn test_product_key_fallbacks() {
        let mut item = OrderItem::new("l1", "", 1);
        item.product_id = Some("p-9".into());
        assert_eq!(item.product_key(), "p-9");
        item.product_id = None;
        item.name = "Geldbörse".into();
        assert_eq!(item.product_key(), "Geldbörse");
    }

    #[test]
    fn test_priority_loose_parse() {
        assert_eq!(Priority::parse_loose(" HIGH "), Some(Priority::High));
        assert_eq!(Priority::parse_loose("whatever"), None);
    }
}
