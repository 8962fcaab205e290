use std::sync::Arc;

use axum::{
    extract::{Path as UrlPath, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    auth::Principal,
    error::AppError,
    models::{AnalysisResult, HistoryEntry},
    services::{
        analysis::{self, AnalyzeOptions},
        storage::AnalysisStore,
        tabular::DEFAULT_TOP_N,
    },
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/analyze/:file_id", post(analyze_file))
        .route("/analyses", get(analysis_history))
        .route("/analyses/:id", delete(delete_analysis))
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeParams {
    /// Aggregate over this column instead of the first one.
    column: Option<String>,
    /// Override the top-N series length.
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    saved: bool,
    sheet_names: Vec<String>,
    analysis: AnalysisResult,
}

async fn analyze_file(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    UrlPath(file_id): UrlPath<i64>,
    Query(params): Query<AnalyzeParams>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    tracing::info!(
        "Starting analysis of file {} for user {}",
        file_id,
        principal.user_id
    );

    let opts = AnalyzeOptions {
        column: params.column,
        top_n: params.limit.unwrap_or(DEFAULT_TOP_N),
        ..AnalyzeOptions::default()
    };
    let outcome = analysis::analyze(&state.store, file_id, principal.user_id, &opts)?;

    Ok(Json(AnalyzeResponse {
        saved: true,
        sheet_names: outcome.sheet_names,
        analysis: outcome.result,
    }))
}

async fn analysis_history(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let history = state.store.list_history(principal.user_id)?;
    Ok(Json(history))
}

async fn delete_analysis(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    UrlPath(id): UrlPath<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let owner = if principal.is_admin() {
        None
    } else {
        Some(principal.user_id)
    };
    if !state.store.delete_analysis(id, owner)? {
        return Err(AppError::NotFound);
    }
    Ok(Json(json!({ "message": "analysis deleted" })))
}
