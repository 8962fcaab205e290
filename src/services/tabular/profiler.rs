use std::collections::HashSet;

use super::types::DecodedSheet;
use crate::models::{ColumnStat, InferredType, NumericStats};

/// Profiles every column of the decoded sheet, in column order. Single pass
/// per column, no I/O, identical output for identical input.
pub fn profile(sheet: &DecodedSheet) -> Vec<ColumnStat> {
    sheet
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| profile_column(sheet, idx, name))
        .collect()
}

fn profile_column(sheet: &DecodedSheet, col: usize, name: &str) -> ColumnStat {
    let mut empty = 0usize;
    let mut seen = HashSet::new();
    let mut inferred_type = InferredType::Unknown;

    let mut numeric_count = 0usize;
    let mut sum = 0.0f64;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for row in 0..sheet.rows.len() {
        let value = sheet.cell(row, col);
        if value.is_empty() {
            empty += 1;
            continue;
        }

        if let Some(key) = value.key() {
            seen.insert(key);
        }
        if inferred_type == InferredType::Unknown {
            inferred_type = value.type_of();
        }
        if let Some(n) = value.as_number() {
            numeric_count += 1;
            sum += n;
            min = min.min(n);
            max = max.max(n);
        }
    }

    let numeric_stats = if numeric_count > 0 {
        Some(NumericStats {
            min,
            max,
            mean: sum / numeric_count as f64,
        })
    } else {
        None
    };

    ColumnStat {
        name: name.to_string(),
        inferred_type,
        unique: seen.len(),
        empty,
        numeric_stats,
    }
}
