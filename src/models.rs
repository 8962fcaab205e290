use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Runtime type category of a profiled column, taken from the first
/// non-empty value in scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferredType {
    Number,
    String,
    Boolean,
    Date,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnStat {
    pub name: String,
    #[serde(rename = "type")]
    pub inferred_type: InferredType,
    pub unique: usize,
    pub empty: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_stats: Option<NumericStats>,
}

/// One (category, count) pair of the frequency-ranked chart series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatePoint {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSummary {
    pub total_rows: usize,
    pub total_columns: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuality {
    pub missing_values: usize,
    pub complete_rows: usize,
}

/// The assembled output of one analyze operation. Created once, persisted
/// once, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub owner_id: i64,
    pub file_id: i64,
    pub file_name: String,
    pub sheet_name: String,
    pub column_stats: Vec<ColumnStat>,
    pub chart_data: Vec<AggregatePoint>,
    pub summary: SheetSummary,
    pub data_quality: DataQuality,
    pub insights: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Upload bookkeeping record. The analysis core treats this as read-only
/// input resolved by the storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub id: i64,
    pub owner_id: i64,
    pub file_name: String,
    pub file_path: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    pub file_name: String,
    pub sheet_name: String,
    pub created_at: DateTime<Utc>,
}
