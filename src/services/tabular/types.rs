use std::fmt;

use chrono::NaiveDateTime;

use crate::models::InferredType;

/// One decoded cell. Decoders map absent and blank cells to `Null`, so a
/// row always has a value slot for every column.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Date(NaiveDateTime),
}

/// Hashable identity for uniqueness counting. Variants keep raw-value
/// identity: `Number(1)` and `Text("1")` stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Bool(bool),
    Number(u64),
    Text(String),
    Date(i64),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn type_of(&self) -> InferredType {
        match self {
            CellValue::Null => InferredType::Unknown,
            CellValue::Bool(_) => InferredType::Boolean,
            CellValue::Number(_) => InferredType::Number,
            CellValue::Text(_) => InferredType::String,
            CellValue::Date(_) => InferredType::Date,
        }
    }

    /// Numeric reading of the cell: numeric-typed cells and numeric-looking
    /// text, finite values only. Booleans and dates do not parse as numbers.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::Text(s) => match s.parse::<f64>() {
                Ok(n) if n.is_finite() => Some(n),
                _ => None,
            },
            _ => None,
        }
    }

    /// Identity key for distinct-value counting. `None` for empty cells.
    pub fn key(&self) -> Option<ValueKey> {
        match self {
            CellValue::Null => None,
            CellValue::Text(s) if s.is_empty() => None,
            CellValue::Bool(b) => Some(ValueKey::Bool(*b)),
            // Normalize -0.0 so both zeroes count as one value.
            CellValue::Number(n) => {
                let n = if *n == 0.0 { 0.0 } else { *n };
                Some(ValueKey::Number(n.to_bits()))
            }
            CellValue::Text(s) => Some(ValueKey::Text(s.clone())),
            CellValue::Date(d) => Some(ValueKey::Date(d.and_utc().timestamp_micros())),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 9e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Which column set governs the decoded sheet.
///
/// `FirstRow` takes the header row as authoritative and truncates wider data
/// rows. `Union` widens the column list to the widest row, naming the extra
/// columns positionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaPolicy {
    #[default]
    FirstRow,
    Union,
}

/// Which cell values the aggregate builder skips when counting categories.
///
/// `AllFalsy` reproduces the historical behavior: null, empty text, `false`,
/// zero, and NaN are all dropped. `EmptyOnly` drops only null and empty text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    AllFalsy,
    EmptyOnly,
}

impl CategoryFilter {
    pub fn skips(&self, value: &CellValue) -> bool {
        if value.is_empty() {
            return true;
        }
        match self {
            CategoryFilter::EmptyOnly => false,
            CategoryFilter::AllFalsy => match value {
                CellValue::Bool(b) => !b,
                CellValue::Number(n) => *n == 0.0 || n.is_nan(),
                _ => false,
            },
        }
    }
}

/// The first worksheet of a decoded workbook, with all data rows in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSheet {
    /// Every sheet name in the workbook, in workbook order.
    pub sheet_names: Vec<String>,
    /// The selected (first) sheet.
    pub sheet_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl DecodedSheet {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at (row, column), with `Null` standing in for missing trailing
    /// cells.
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        static NULL_CELL: CellValue = CellValue::Null;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&NULL_CELL)
    }
}
