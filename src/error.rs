use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::AnalysisResult;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("authentication required: {0}")]
    Unauthorized(String),

    #[error("file not found")]
    NotFound,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid or corrupted file: {0}")]
    Decode(String),

    #[error("file has no data")]
    EmptySheet,

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("stored file is unreadable: {0}")]
    UnreadableFile(String),

    // Carries the computed document so the caller can still display it
    // even though it was not saved.
    #[error("failed to save analysis: {reason}")]
    Persistence {
        reason: String,
        unsaved: Box<AnalysisResult>,
    },

    #[error("database error: {0}")]
    Database(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "unauthorized",
            AppError::NotFound => "not_found",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Decode(_) => "decode",
            AppError::EmptySheet => "empty_sheet",
            AppError::UnknownColumn(_) => "unknown_column",
            AppError::UnreadableFile(_) => "unreadable_file",
            AppError::Persistence { .. } => "persistence",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
            AppError::Io(_) => "io",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_)
            | AppError::Decode(_)
            | AppError::EmptySheet
            | AppError::UnknownColumn(_) => StatusCode::BAD_REQUEST,
            AppError::UnreadableFile(_)
            | AppError::Persistence { .. }
            | AppError::Database(_)
            | AppError::Internal(_)
            | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let message = self.to_string();

        let body = match self {
            AppError::Persistence { unsaved, .. } => Json(json!({
                "kind": kind,
                "error": message,
                "saved": false,
                "analysis": *unsaved,
            })),
            _ => Json(json!({
                "kind": kind,
                "error": message,
            })),
        };

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinct_per_variant() {
        let errors = [
            AppError::Unauthorized("no header".into()),
            AppError::NotFound,
            AppError::InvalidInput("bad".into()),
            AppError::Decode("garbage".into()),
            AppError::EmptySheet,
            AppError::UnknownColumn("Region".into()),
            AppError::UnreadableFile("gone".into()),
            AppError::Database("locked".into()),
            AppError::Internal("oops".into()),
        ];
        let kinds: std::collections::HashSet<_> =
            errors.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn client_errors_map_to_4xx() {
        assert_eq!(AppError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::EmptySheet.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Decode("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Database("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
