//! 订单候选标识符

use serde::{Deserialize, Serialize};
use std::fmt;

/// 候选标识符字段
///
/// 变体顺序即身份匹配优先级：越靠前的字段在上游版本迭代中越稳定。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierField {
    ExternalId,
    DocumentNumber,
    ExternalOrderNumber,
    CustomerOrderNumber,
    DeliveryNoteNumber,
}

impl IdentifierField {
    /// 身份匹配顺序
    pub const RESOLUTION_ORDER: [IdentifierField; 5] = [
        IdentifierField::ExternalId,
        IdentifierField::DocumentNumber,
        IdentifierField::ExternalOrderNumber,
        IdentifierField::CustomerOrderNumber,
        IdentifierField::DeliveryNoteNumber,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierField::ExternalId => "external_id",
            IdentifierField::DocumentNumber => "document_number",
            IdentifierField::ExternalOrderNumber => "external_order_number",
            IdentifierField::CustomerOrderNumber => "customer_order_number",
            IdentifierField::DeliveryNoteNumber => "delivery_note_number",
        }
    }

    /// 本地唯一的字段（跨订单重复视为冲突）
    pub fn is_unique(&self) -> bool {
        matches!(self, IdentifierField::DeliveryNoteNumber)
    }
}

impl fmt::Display for IdentifierField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 订单的全部候选标识符
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct OrderIdentifiers {
    /// 外部系统 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// 外部单据号
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_number: Option<String>,
    /// 外部订单号
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_order_number: Option<String>,
    /// 客户订单号
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_order_number: Option<String>,
    /// 内部发货单号
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_note_number: Option<String>,
}

impl OrderIdentifiers {
    pub fn get(&self, field: IdentifierField) -> Option<&str> {
        let value = match field {
            IdentifierField::ExternalId => &self.external_id,
            IdentifierField::DocumentNumber => &self.document_number,
            IdentifierField::ExternalOrderNumber => &self.external_order_number,
            IdentifierField::CustomerOrderNumber => &self.customer_order_number,
            IdentifierField::DeliveryNoteNumber => &self.delivery_note_number,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }

    fn slot_mut(&mut self, field: IdentifierField) -> &mut Option<String> {
        match field {
            IdentifierField::ExternalId => &mut self.external_id,
            IdentifierField::DocumentNumber => &mut self.document_number,
            IdentifierField::ExternalOrderNumber => &mut self.external_order_number,
            IdentifierField::CustomerOrderNumber => &mut self.customer_order_number,
            IdentifierField::DeliveryNoteNumber => &mut self.delivery_note_number,
        }
    }

    /// 按匹配优先级列出所有非空标识符
    pub fn candidates(&self) -> Vec<(IdentifierField, &str)> {
        IdentifierField::RESOLUTION_ORDER
            .iter()
            .filter_map(|field| self.get(*field).map(|value| (*field, value)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates().is_empty()
    }

    /// 用于日志的首选标识
    pub fn display_key(&self) -> &str {
        self.get(IdentifierField::DeliveryNoteNumber)
            .or_else(|| self.candidates().first().map(|(_, v)| *v))
            .unwrap_or("<unidentified>")
    }

    /// 用 `other` 补齐本地缺失的标识符，已有值保持不变
    pub fn fill_missing(&mut self, other: &OrderIdentifiers) {
        for field in IdentifierField::RESOLUTION_ORDER {
            if self.get(field).is_none()
                && let Some(value) = other.get(field)
            {
                *self.slot_mut(field) = Some(value.to_string());
            }
        }
    }
}
