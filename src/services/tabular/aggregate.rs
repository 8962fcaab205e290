use indexmap::IndexMap;

use super::types::{CategoryFilter, DecodedSheet};
use crate::models::AggregatePoint;

pub const DEFAULT_TOP_N: usize = 5;

/// Frequency-ranked top categories of one column. Counts are keyed by the
/// cell's display string; the map preserves first-encounter order so the
/// stable descending sort keeps ties in insertion order. An unknown column
/// or an all-skipped column yields an empty series.
pub fn top_categories(
    sheet: &DecodedSheet,
    column: &str,
    limit: usize,
    filter: CategoryFilter,
) -> Vec<AggregatePoint> {
    let Some(col) = sheet.column_index(column) else {
        return Vec::new();
    };

    let mut counts: IndexMap<String, u64> = IndexMap::new();
    for row in 0..sheet.rows.len() {
        let value = sheet.cell(row, col);
        if filter.skips(value) {
            continue;
        }
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }

    let mut points: Vec<AggregatePoint> = counts
        .into_iter()
        .map(|(name, count)| AggregatePoint { name, count })
        .collect();
    points.sort_by(|a, b| b.count.cmp(&a.count));
    points.truncate(limit);
    points
}
