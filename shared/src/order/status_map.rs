//! 状态词汇互译
//!
//! 内部状态 ⇄ 外部履约系统状态。两个方向都是全函数：
//! 无法识别的输入不会报错，而是退化到最安全的状态
//! （入站 → `new`，出站 → 该系统的"待处理"状态）。
//!
//! 同一个外部系统的状态词汇会随版本演进，因此每张表都带版本号。
//! 入站查找从最新版本往旧版本依次尝试；出站始终使用当前版本。
//!
//! | 系统 | 版本 | 示例 |
//! |------|------|------|
//! | No Border | 1 | `created`, `released`, `processing` |
//! | No Border | 2 | `inFulfillment`, `processing`, `canceled` |
//! | No Border | 3 | `in fulfillment`, `in progress`, `cancelled` |
//! | Xentral | 1 | `open`, `processing`, `packed` |

use serde::{Deserialize, Serialize};
use std::fmt;

use super::status::OrderStatus;

/// 外部履约系统
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceSystem {
    NoBorder,
    Xentral,
}

impl fmt::Display for SourceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSystem::NoBorder => write!(f, "no_border"),
            SourceSystem::Xentral => write!(f, "xentral"),
        }
    }
}

/// 单个版本的状态词汇表
#[derive(Debug)]
pub struct StatusVocabulary {
    pub system: SourceSystem,
    pub version: u16,
    pub inbound: &'static [(&'static str, OrderStatus)],
    pub outbound: &'static [(OrderStatus, &'static str)],
}

// ============================================================================
// No Border
// ============================================================================

const NO_BORDER_V1: StatusVocabulary = StatusVocabulary {
    system: SourceSystem::NoBorder,
    version: 1,
    inbound: &[
        ("created", OrderStatus::New),
        ("released", OrderStatus::New),
        ("processing", OrderStatus::InProgress),
        ("shipped", OrderStatus::Shipped),
        ("completed", OrderStatus::Completed),
        ("canceled", OrderStatus::Cancelled),
    ],
    outbound: &[
        (OrderStatus::New, "released"),
        (OrderStatus::InProgress, "processing"),
        (OrderStatus::Packed, "processing"),
        (OrderStatus::Shipped, "shipped"),
        (OrderStatus::Completed, "completed"),
        (OrderStatus::Cancelled, "canceled"),
    ],
};

const NO_BORDER_V2: StatusVocabulary = StatusVocabulary {
    system: SourceSystem::NoBorder,
    version: 2,
    inbound: &[
        ("inFulfillment", OrderStatus::New),
        ("created", OrderStatus::New),
        ("released", OrderStatus::New),
        ("processing", OrderStatus::InProgress),
        ("shipped", OrderStatus::Shipped),
        ("completed", OrderStatus::Completed),
        ("canceled", OrderStatus::Cancelled),
    ],
    outbound: &[
        (OrderStatus::New, "inFulfillment"),
        (OrderStatus::InProgress, "processing"),
        (OrderStatus::Packed, "processing"),
        (OrderStatus::Shipped, "shipped"),
        (OrderStatus::Completed, "completed"),
        (OrderStatus::Cancelled, "canceled"),
    ],
};

const NO_BORDER_V3: StatusVocabulary = StatusVocabulary {
    system: SourceSystem::NoBorder,
    version: 3,
    inbound: &[
        ("in fulfillment", OrderStatus::New),
        ("open", OrderStatus::New),
        ("in progress", OrderStatus::InProgress),
        ("packed", OrderStatus::Packed),
        ("shipped", OrderStatus::Shipped),
        ("completed", OrderStatus::Completed),
        ("cancelled", OrderStatus::Cancelled),
    ],
    outbound: &[
        (OrderStatus::New, "in fulfillment"),
        (OrderStatus::InProgress, "in progress"),
        (OrderStatus::Packed, "packed"),
        (OrderStatus::Shipped, "shipped"),
        (OrderStatus::Completed, "completed"),
        (OrderStatus::Cancelled, "cancelled"),
    ],
};

/// 新 → 旧
const NO_BORDER_VOCABULARIES: &[StatusVocabulary] = &[NO_BORDER_V3, NO_BORDER_V2, NO_BORDER_V1];

/// 上游 API 当前接受的出站词汇版本
pub const NO_BORDER_CURRENT_VERSION: u16 = 2;

// ============================================================================
// Xentral
// ============================================================================

const XENTRAL_V1: StatusVocabulary = StatusVocabulary {
    system: SourceSystem::Xentral,
    version: 1,
    inbound: &[
        ("open", OrderStatus::New),
        ("processing", OrderStatus::InProgress),
        ("packed", OrderStatus::Packed),
        ("shipped", OrderStatus::Shipped),
        ("completed", OrderStatus::Completed),
        ("cancelled", OrderStatus::Cancelled),
    ],
    outbound: &[
        (OrderStatus::New, "open"),
        (OrderStatus::InProgress, "processing"),
        (OrderStatus::Packed, "packed"),
        (OrderStatus::Shipped, "shipped"),
        (OrderStatus::Completed, "completed"),
        (OrderStatus::Cancelled, "cancelled"),
    ],
};

const XENTRAL_VOCABULARIES: &[StatusVocabulary] = &[XENTRAL_V1];

pub const XENTRAL_CURRENT_VERSION: u16 = 1;

// ============================================================================
// Translation
// ============================================================================

/// 某系统的全部词汇表（新 → 旧）
pub fn vocabularies(system: SourceSystem) -> &'static [StatusVocabulary] {
    match system {
        SourceSystem::NoBorder => NO_BORDER_VOCABULARIES,
        SourceSystem::Xentral => XENTRAL_VOCABULARIES,
    }
}

/// 按版本取词汇表
pub fn vocabulary(system: SourceSystem, version: u16) -> Option<&'static StatusVocabulary> {
    vocabularies(system).iter().find(|v| v.version == version)
}

fn current_vocabulary(system: SourceSystem) -> &'static StatusVocabulary {
    let version = match system {
        SourceSystem::NoBorder => NO_BORDER_CURRENT_VERSION,
        SourceSystem::Xentral => XENTRAL_CURRENT_VERSION,
    };
    // 当前版本一定存在于表中
    vocabulary(system, version).unwrap_or(&vocabularies(system)[0])
}

/// 外部系统"待处理"状态（出站默认值）
pub fn open_status(system: SourceSystem) -> &'static str {
    match system {
        SourceSystem::NoBorder => "inFulfillment",
        SourceSystem::Xentral => "open",
    }
}

/// 外部状态 → 内部状态
///
/// 先精确匹配（新版本优先），再忽略大小写匹配；都失败时返回 `new`。
pub fn to_internal(external: &str, system: SourceSystem) -> OrderStatus {
    let external = external.trim();
    let tables = vocabularies(system);

    let exact = tables
        .iter()
        .flat_map(|v| v.inbound.iter())
        .find(|(name, _)| *name == external);
    if let Some((_, status)) = exact {
        return *status;
    }

    tables
        .iter()
        .flat_map(|v| v.inbound.iter())
        .find(|(name, _)| name.eq_ignore_ascii_case(external))
        .map(|(_, status)| *status)
        .unwrap_or(OrderStatus::New)
}

/// 内部状态 → 外部状态（当前版本词汇）
pub fn to_external(internal: OrderStatus, system: SourceSystem) -> &'static str {
    lookup_outbound(current_vocabulary(system), internal)
}

/// 内部状态 → 指定版本的外部状态；版本不存在时使用当前版本
pub fn to_external_versioned(
    internal: OrderStatus,
    system: SourceSystem,
    version: u16,
) -> &'static str {
    let table = vocabulary(system, version).unwrap_or_else(|| current_vocabulary(system));
    lookup_outbound(table, internal)
}

fn lookup_outbound(table: &StatusVocabulary, internal: OrderStatus) -> &'static str {
    table
        .outbound
        .iter()
        .find(|(status, _)| *status == internal)
        .map(|(_, name)| *name)
        .unwrap_or_else(|| open_status(table.system))
}

/// 外部状态是否正是本地状态出站后的写法（任一版本）
///
/// 外部词汇比内部粗（如 `packed` 与 `in_progress` 都写成 `processing`），
/// 此时外部状态不携带新信息。
pub fn is_outbound_form(local: OrderStatus, external: &str, system: SourceSystem) -> bool {
    let external = external.trim();
    !external.is_empty()
        && vocabularies(system)
            .iter()
            .any(|table| lookup_outbound(table, local).eq_ignore_ascii_case(external))
}

/// 是否为"可履约"状态（含历史拼写）
pub fn is_ready_for_fulfillment(external: &str) -> bool {
    let normalized: String = external
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .collect::<String>()
        .to_ascii_lowercase();
    matches!(normalized.as_str(), "infulfillment" | "processing")
}
