//! 批次拣货类型
//!
//! 合并拣货单与批次都是派生视图：每次按需从订单重新计算，
//! 不作为权威状态持久化。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 批次分类
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum BatchCategory {
    /// 加急（时间敏感）
    Express,
    /// 单品小单
    SingleItem,
    /// 大件 / 重货
    Bulky,
    /// 多品标准单
    MultiItem,
}

impl BatchCategory {
    /// 预览时的展示顺序
    pub const ALL: [BatchCategory; 4] = [
        BatchCategory::Express,
        BatchCategory::SingleItem,
        BatchCategory::MultiItem,
        BatchCategory::Bulky,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchCategory::Express => "express",
            BatchCategory::SingleItem => "single_item",
            BatchCategory::Bulky => "bulky",
            BatchCategory::MultiItem => "multi_item",
        }
    }

    /// 展示名称
    pub fn label(&self) -> &'static str {
        match self {
            BatchCategory::Express => "Express-Aufträge",
            BatchCategory::SingleItem => "Einzelartikel",
            BatchCategory::Bulky => "Großaufträge",
            BatchCategory::MultiItem => "Standard Multi-Artikel",
        }
    }
}

impl fmt::Display for BatchCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "express" => Ok(BatchCategory::Express),
            "single_item" | "singleItem" => Ok(BatchCategory::SingleItem),
            "bulky" => Ok(BatchCategory::Bulky),
            "multi_item" | "multiItem" => Ok(BatchCategory::MultiItem),
            other => Err(format!("unknown batch category: {other}")),
        }
    }
}

/// 合并行中单个订单的份额
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderBreakdown {
    pub order_id: String,
    /// 订单内对应的行 ID
    pub line_id: String,
    pub delivery_note_number: String,
    pub customer_name: String,
    /// 该订单在此合并行上的需求数量
    pub quantity: u32,
}

/// 跨订单合并拣货行
///
/// 不变量：`breakdown` 数量之和恒等于 `total_quantity`；
/// `breakdown` 保持订单加入顺序（最早创建的在前），也是分配顺序。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsolidatedLine {
    /// 商品标识（合并主键之一）
    pub product_key: String,
    pub sku: String,
    pub name: String,
    pub unit: String,
    pub ean: String,
    /// 库位（合并主键之一）
    pub storage_location: String,
    pub total_quantity: u32,
    /// 创建时已拣的数量合计
    pub picked_quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_weight: Option<f64>,
    pub breakdown: Vec<OrderBreakdown>,
}

impl ConsolidatedLine {
    /// 尚未拣取的数量
    pub fn outstanding(&self) -> u32 {
        self.total_quantity.saturating_sub(self.picked_quantity)
    }

    /// 份额之和（应等于 `total_quantity`）
    pub fn breakdown_total(&self) -> u32 {
        self.breakdown.iter().map(|b| b.quantity).sum()
    }
}

/// 批次统计（预览用）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchStats {
    pub category: BatchCategory,
    pub order_count: usize,
    /// 合并后的行数
    pub line_count: usize,
    pub total_quantity: u32,
    /// 预估拣货分钟数：每件 0.5 分钟，向上取整
    pub estimated_minutes: u32,
    pub unique_locations: usize,
}

impl BatchStats {
    /// 由合并拣货单计算统计
    pub fn from_lines(category: BatchCategory, order_count: usize, lines: &[ConsolidatedLine]) -> Self {
        let total_quantity: u32 = lines.iter().map(|l| l.total_quantity).sum();
        let mut locations: Vec<&str> = lines.iter().map(|l| l.storage_location.as_str()).collect();
        locations.sort_unstable();
        locations.dedup();

        Self {
            category,
            order_count,
            line_count: lines.len(),
            total_quantity,
            estimated_minutes: total_quantity.div_ceil(2),
            unique_locations: locations.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(location: &str, qty: u32) -> ConsolidatedLine {
        ConsolidatedLine {
            product_key: "A1".into(),
            sku: "A1".into(),
            name: String::new(),
            unit: "Stk".into(),
            ean: String::new(),
            storage_location: location.into(),
            total_quantity: qty,
            picked_quantity: 0,
            unit_weight: None,
            breakdown: vec![],
        }
    }

    #[test]
    fn test_stats_estimate_rounds_up() {
        let lines = vec![line("A01-01-01", 3), line("A01-01-01", 2), line("B01-01-01", 2)];
        let stats = BatchStats::from_lines(BatchCategory::MultiItem, 2, &lines);
        assert_eq!(stats.total_quantity, 7);
        assert_eq!(stats.estimated_minutes, 4);
        assert_eq!(stats.unique_locations, 2);
    }

    #[test]
    fn test_category_parse_accepts_camel_case() {
        assert_eq!("singleItem".parse::<BatchCategory>(), Ok(BatchCategory::SingleItem));
        assert_eq!("bulky".parse::<BatchCategory>(), Ok(BatchCategory::Bulky));
        assert!("other".parse::<BatchCategory>().is_err());
    }
}
