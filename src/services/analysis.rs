use chrono::Utc;
use tracing::info;

use super::storage::AnalysisStore;
use super::tabular::{self, CategoryFilter, DecodedSheet, FormatHint, SchemaPolicy, DEFAULT_TOP_N};
use crate::error::AppError;
use crate::models::{AnalysisResult, ColumnStat, DataQuality, SheetSummary};

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Aggregate over this column instead of the first one.
    pub column: Option<String>,
    pub schema: SchemaPolicy,
    pub category_filter: CategoryFilter,
    pub top_n: usize,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            column: None,
            schema: SchemaPolicy::default(),
            category_filter: CategoryFilter::default(),
            top_n: DEFAULT_TOP_N,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalyzeOutcome {
    pub result: AnalysisResult,
    /// Every sheet in the workbook; only the first was analyzed.
    pub sheet_names: Vec<String>,
}

/// Runs one analyze request end to end: resolve the upload, fetch its bytes,
/// decode, profile, aggregate, assemble, persist. Steps are strictly
/// sequential and nothing is retried; each invocation is independent.
pub fn analyze(
    store: &dyn AnalysisStore,
    file_id: i64,
    owner_id: i64,
    opts: &AnalyzeOptions,
) -> Result<AnalyzeOutcome, AppError> {
    let start = std::time::Instant::now();

    let upload = store
        .find_upload(file_id, owner_id)?
        .ok_or(AppError::NotFound)?;
    let bytes = store.read_upload_bytes(&upload)?;

    let hint = FormatHint::from_file_name(&upload.file_name).ok_or_else(|| {
        AppError::Decode(format!("unsupported file type: {}", upload.file_name))
    })?;
    let sheet = tabular::decode(&bytes, hint, opts.schema)?;
    info!(
        "Decoded {} rows x {} columns from {}",
        sheet.rows.len(),
        sheet.columns.len(),
        upload.file_name
    );

    let column_stats = tabular::profile(&sheet);

    let target = match &opts.column {
        Some(name) => {
            if sheet.column_index(name).is_none() {
                return Err(AppError::UnknownColumn(name.clone()));
            }
            name.clone()
        }
        None => sheet.columns[0].clone(),
    };
    let chart_data = tabular::top_categories(&sheet, &target, opts.top_n, opts.category_filter);

    let data_quality = data_quality(&sheet, &column_stats);
    let insights = derive_insights(&column_stats, &data_quality);
    let mut result = AnalysisResult {
        id: None,
        owner_id,
        file_id: upload.id,
        file_name: upload.file_name.clone(),
        sheet_name: sheet.sheet_name.clone(),
        summary: SheetSummary {
            total_rows: sheet.rows.len(),
            total_columns: sheet.columns.len(),
        },
        column_stats,
        chart_data,
        data_quality,
        insights,
        created_at: Utc::now(),
    };

    match store.save_analysis(&result) {
        Ok(id) => {
            result.id = Some(id);
            info!(
                "Analysis {} of file {} completed in {:?}",
                id,
                file_id,
                start.elapsed()
            );
            Ok(AnalyzeOutcome {
                result,
                sheet_names: sheet.sheet_names,
            })
        }
        Err(e) => Err(AppError::Persistence {
            reason: e.to_string(),
            unsaved: Box::new(result),
        }),
    }
}

fn data_quality(sheet: &DecodedSheet, stats: &[ColumnStat]) -> DataQuality {
    let missing_values = stats.iter().map(|s| s.empty).sum();
    let complete_rows = sheet
        .rows
        .iter()
        .filter(|row| {
            (0..sheet.columns.len()).all(|col| {
                row.get(col)
                    .map(|cell| !cell.is_empty())
                    .unwrap_or(false)
            })
        })
        .count();
    DataQuality {
        missing_values,
        complete_rows,
    }
}

fn derive_insights(stats: &[ColumnStat], quality: &DataQuality) -> Vec<String> {
    let mut insights = Vec::new();
    let numeric_columns = stats.iter().filter(|s| s.numeric_stats.is_some()).count();
    if numeric_columns >= 2 {
        insights
            .push("multiple numeric columns detected; correlation analysis possible".to_string());
    }
    if quality.missing_values > 0 {
        insights.push(format!("{} missing values found", quality.missing_values));
    }
    insights
}
