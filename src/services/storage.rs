use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, error, info};

use crate::error::AppError;
use crate::models::{AnalysisResult, HistoryEntry, UploadedFile};

/// History responses are capped; older records stay in the table.
const HISTORY_LIMIT: usize = 20;

/// Durable bookkeeping the analysis core collaborates with: upload records,
/// raw file bytes, and persisted analysis documents.
///
/// `owner` filters of `None` are the elevated (admin) path that skips the
/// ownership check; handlers decide when that is allowed.
pub trait AnalysisStore: Send + Sync {
    fn insert_upload(
        &self,
        owner_id: i64,
        file_name: &str,
        file_path: &str,
        size_bytes: u64,
    ) -> Result<UploadedFile, AppError>;

    /// Resolves an upload by id and owner. Absence and foreign ownership are
    /// indistinguishable to the caller.
    fn find_upload(&self, file_id: i64, owner_id: i64) -> Result<Option<UploadedFile>, AppError>;

    fn list_uploads(&self, owner_id: i64) -> Result<Vec<UploadedFile>, AppError>;

    /// Deletes the bookkeeping row and returns the record so the caller can
    /// unlink the backing file.
    fn delete_upload(
        &self,
        file_id: i64,
        owner: Option<i64>,
    ) -> Result<Option<UploadedFile>, AppError>;

    fn read_upload_bytes(&self, upload: &UploadedFile) -> Result<Bytes, AppError>;

    /// Single write attempt, no retry. The caller decides what a failure
    /// means for the already-computed document.
    fn save_analysis(&self, result: &AnalysisResult) -> Result<i64, AppError>;

    fn list_history(&self, owner_id: i64) -> Result<Vec<HistoryEntry>, AppError>;

    fn delete_analysis(&self, id: i64, owner: Option<i64>) -> Result<bool, AppError>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, AppError> {
        info!("Opening analytics database at {}", path);
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(|e| {
            error!("Failed to open database {}: {}", path, e);
            AppError::Database(e.to_string())
        })?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory().map_err(|e| AppError::Database(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, AppError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS uploads (
                id          INTEGER PRIMARY KEY,
                owner_id    INTEGER NOT NULL,
                file_name   TEXT NOT NULL,
                file_path   TEXT NOT NULL,
                size_bytes  INTEGER NOT NULL,
                created_at  TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS analyses (
                id          INTEGER PRIMARY KEY,
                owner_id    INTEGER NOT NULL,
                file_id     INTEGER NOT NULL,
                file_name   TEXT NOT NULL,
                sheet_name  TEXT NOT NULL,
                result_json TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );",
        )?;
        debug!("Database schema ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Database(format!("bad timestamp {raw}: {e}")))
}

type UploadRow = (i64, i64, String, String, i64, String);

fn upload_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UploadRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn finish_upload(row: UploadRow) -> Result<UploadedFile, AppError> {
    let (id, owner_id, file_name, file_path, size_bytes, raw) = row;
    Ok(UploadedFile {
        id,
        owner_id,
        file_name,
        file_path,
        size_bytes: size_bytes as u64,
        created_at: parse_timestamp(&raw)?,
    })
}

impl AnalysisStore for SqliteStore {
    fn insert_upload(
        &self,
        owner_id: i64,
        file_name: &str,
        file_path: &str,
        size_bytes: u64,
    ) -> Result<UploadedFile, AppError> {
        let created_at = Utc::now();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO uploads (owner_id, file_name, file_path, size_bytes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                owner_id,
                file_name,
                file_path,
                size_bytes as i64,
                created_at.to_rfc3339()
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!("Recorded upload {} for user {}", id, owner_id);
        Ok(UploadedFile {
            id,
            owner_id,
            file_name: file_name.to_string(),
            file_path: file_path.to_string(),
            size_bytes,
            created_at,
        })
    }

    fn find_upload(&self, file_id: i64, owner_id: i64) -> Result<Option<UploadedFile>, AppError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, owner_id, file_name, file_path, size_bytes, created_at
                 FROM uploads WHERE id = ?1 AND owner_id = ?2",
                params![file_id, owner_id],
                upload_from_row,
            )
            .optional()?;
        row.map(finish_upload).transpose()
    }

    fn list_uploads(&self, owner_id: i64) -> Result<Vec<UploadedFile>, AppError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, file_name, file_path, size_bytes, created_at
             FROM uploads WHERE owner_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![owner_id], upload_from_row)?;
        rows.map(|r| finish_upload(r?)).collect()
    }

    fn delete_upload(
        &self,
        file_id: i64,
        owner: Option<i64>,
    ) -> Result<Option<UploadedFile>, AppError> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT id, owner_id, file_name, file_path, size_bytes, created_at
                 FROM uploads WHERE id = ?1 AND (?2 IS NULL OR owner_id = ?2)",
                params![file_id, owner],
                upload_from_row,
            )
            .optional()?;
        let Some(pair) = found else {
            return Ok(None);
        };
        conn.execute("DELETE FROM uploads WHERE id = ?1", params![file_id])?;
        finish_upload(pair).map(Some)
    }

    fn read_upload_bytes(&self, upload: &UploadedFile) -> Result<Bytes, AppError> {
        std::fs::read(&upload.file_path).map(Bytes::from).map_err(|e| {
            error!(
                "Upload {} backing file {} is unreadable: {}",
                upload.id, upload.file_path, e
            );
            AppError::UnreadableFile(format!("{}: {e}", upload.file_name))
        })
    }

    fn save_analysis(&self, result: &AnalysisResult) -> Result<i64, AppError> {
        let document = serde_json::to_string(result)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO analyses (owner_id, file_id, file_name, sheet_name, result_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                result.owner_id,
                result.file_id,
                result.file_name,
                result.sheet_name,
                document,
                result.created_at.to_rfc3339()
            ],
        )?;
        let id = conn.last_insert_rowid();
        info!(
            "Saved analysis {} of file {} for user {}",
            id, result.file_id, result.owner_id
        );
        Ok(id)
    }

    fn list_history(&self, owner_id: i64) -> Result<Vec<HistoryEntry>, AppError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, file_name, sheet_name, created_at
             FROM analyses WHERE owner_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![owner_id, HISTORY_LIMIT as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        rows.map(|r| {
            let (id, file_name, sheet_name, raw) = r?;
            Ok(HistoryEntry {
                id,
                file_name,
                sheet_name,
                created_at: parse_timestamp(&raw)?,
            })
        })
        .collect()
    }

    fn delete_analysis(&self, id: i64, owner: Option<i64>) -> Result<bool, AppError> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM analyses WHERE id = ?1 AND (?2 IS NULL OR owner_id = ?2)",
            params![id, owner],
        )?;
        Ok(deleted > 0)
    }
}
