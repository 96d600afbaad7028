//! 仓库路线排序
//!
//! 库位格式 `Zone Aisle-Rack-Level`，例如 `A01-02-03` 或 `A 01-02-03`。
//! 按 `(区, 通道, 货架, 层)` 稳定排序；无法解析的库位排在最后。

use shared::batch::ConsolidatedLine;
use std::cmp::Ordering;

/// 解析后的库位
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocationKey {
    pub zone: String,
    pub aisle: u32,
    pub rack: u32,
    pub level: u32,
}

impl LocationKey {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let split = raw
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(raw.len());
        let (zone, rest) = raw.split_at(split);
        if zone.is_empty() {
            return None;
        }

        let mut parts = rest.trim_start().split('-').map(|p| p.trim().parse::<u32>());
        let (Some(Ok(aisle)), Some(Ok(rack)), Some(Ok(level)), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return None;
        };

        Some(Self {
            zone: zone.to_ascii_uppercase(),
            aisle,
            rack,
            level,
        })
    }
}

/// 标准排序：可解析的在前，按库位升序
fn compare_locations(a: &Option<LocationKey>, b: &Option<LocationKey>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// 按标准路线排序
pub fn optimize(mut lines: Vec<ConsolidatedLine>) -> Vec<ConsolidatedLine> {
    lines.sort_by_cached_key(|line| SortKey(LocationKey::parse(&line.storage_location)));
    lines
}

/// 优先拣指定区，其余按标准路线
pub fn optimize_for_zone(mut lines: Vec<ConsolidatedLine>, zone: &str) -> Vec<ConsolidatedLine> {
    let zone = zone.trim().to_ascii_uppercase();
    lines.sort_by_cached_key(|line| {
        let key = LocationKey::parse(&line.storage_location);
        let preferred = key.as_ref().is_some_and(|k| k.zone == zone);
        (!preferred, SortKey(key))
    });
    lines
}

/// 解析失败视为最大值的排序键
#[derive(PartialEq, Eq)]
struct SortKey(Option<LocationKey>);

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_locations(&self.0, &other.0)
    }
}
