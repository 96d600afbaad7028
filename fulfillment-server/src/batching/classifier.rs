//! 订单分类器
//!
//! 决策列表，第一条命中的规则胜出：
//!
//! | 顺序 | 分类 | 条件 |
//! |------|------|------|
//! | 1 | express | 高优先级 / 发货方式含 "express" / 截止时间在紧急窗口内 |
//! | 2 | single_item | 仅一种商品且总件数 < 5 |
//! | 3 | bulky | 总重 > 30 kg / 单行重 > 20 kg / 行数 > 10 / 单行件数 > 20 |
//! | 4 | multi_item | 其他 |
//!
//! 结果只依赖订单内容、`now` 与阈值配置。

use shared::batch::BatchCategory;
use shared::order::{Order, Priority};

/// 分类阈值
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    /// 截止时间距今不超过该窗口视为加急 (毫秒)
    pub urgency_window_ms: i64,
    /// 单品小单的总件数上限（不含）
    pub single_item_max_quantity: u32,
    /// 大件总重阈值 (kg)
    pub bulky_total_weight_kg: f64,
    /// 大件单行重量阈值 (kg)
    pub bulky_line_weight_kg: f64,
    /// 行数超过该值视为大单
    pub bulky_line_count: usize,
    /// 单行件数超过该值视为大单
    pub bulky_line_quantity: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            urgency_window_ms: 4 * 60 * 60 * 1000,
            single_item_max_quantity: 5,
            bulky_total_weight_kg: 30.0,
            bulky_line_weight_kg: 20.0,
            bulky_line_count: 10,
            bulky_line_quantity: 20,
        }
    }
}

/// 为订单选择批次分类
pub fn classify(order: &Order, now: i64, config: &ClassifierConfig) -> BatchCategory {
    if is_express(order, now, config) {
        BatchCategory::Express
    } else if order.distinct_products() == 1
        && order.total_quantity() < config.single_item_max_quantity
    {
        BatchCategory::SingleItem
    } else if is_bulky(order, config) {
        BatchCategory::Bulky
    } else {
        BatchCategory::MultiItem
    }
}

fn is_express(order: &Order, now: i64, config: &ClassifierConfig) -> bool {
    order.priority == Priority::High
        || order
            .shipping
            .method_name
            .to_lowercase()
            .contains("express")
        || order
            .shipping
            .deadline
            .is_some_and(|deadline| deadline - now <= config.urgency_window_ms)
}

fn is_bulky(order: &Order, config: &ClassifierConfig) -> bool {
    order.total_weight() > config.bulky_total_weight_kg
        || order
            .items
            .iter()
            .any(|i| i.line_weight() > config.bulky_line_weight_kg)
        || order.items.len() > config.bulky_line_count
        || order
            .items
            .iter()
            .any(|i| i.quantity > config.bulky_line_quantity)
}
