use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path as UrlPath, State},
    routing::{delete, post},
    Json, Router,
};
use bytes::Bytes;
use chrono::Utc;
use serde_json::json;

use crate::{
    auth::Principal,
    error::AppError,
    models::UploadedFile,
    services::{storage::AnalysisStore, tabular::FormatHint},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/uploads", post(upload_file).get(list_uploads))
        .route("/uploads/:id", delete(delete_upload))
}

async fn upload_file(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    mut multipart: Multipart,
) -> Result<Json<UploadedFile>, AppError> {
    let mut file: Option<(String, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::InvalidInput("missing file name".to_string()))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(format!("failed to read upload: {e}")))?;
        file = Some((file_name, data));
        break;
    }

    let (file_name, data) =
        file.ok_or_else(|| AppError::InvalidInput("no file provided".to_string()))?;

    if FormatHint::from_file_name(&file_name).is_none() {
        return Err(AppError::InvalidInput(
            "only .xlsx or .csv files are accepted".to_string(),
        ));
    }
    if data.len() > state.config.max_upload_bytes {
        return Err(AppError::InvalidInput(format!(
            "file exceeds the {} byte upload limit",
            state.config.max_upload_bytes
        )));
    }

    let disk_name = format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        sanitize_file_name(&file_name)
    );
    let path = Path::new(&state.config.upload_dir).join(disk_name);
    std::fs::write(&path, &data)?;

    tracing::info!(
        "Stored upload {} ({} bytes) for user {}",
        file_name,
        data.len(),
        principal.user_id
    );

    let upload = state.store.insert_upload(
        principal.user_id,
        &file_name,
        &path.to_string_lossy(),
        data.len() as u64,
    )?;
    Ok(Json(upload))
}

async fn list_uploads(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<UploadedFile>>, AppError> {
    let uploads = state.store.list_uploads(principal.user_id)?;
    Ok(Json(uploads))
}

async fn delete_upload(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    UrlPath(file_id): UrlPath<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let owner = if principal.is_admin() {
        None
    } else {
        Some(principal.user_id)
    };
    let removed = state
        .store
        .delete_upload(file_id, owner)?
        .ok_or(AppError::NotFound)?;

    // The bookkeeping row is gone; a leftover file only wastes disk.
    if let Err(e) = std::fs::remove_file(&removed.file_path) {
        tracing::warn!("Could not remove {}: {}", removed.file_path, e);
    }
    Ok(Json(json!({ "message": "file deleted" })))
}

fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    base.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories_and_odd_characters() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("q3 sales (final).xlsx"), "q3_sales__final_.xlsx");
        assert_eq!(sanitize_file_name("plain.csv"), "plain.csv");
    }
}
