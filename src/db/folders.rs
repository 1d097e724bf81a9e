//! Watched folder records and progress counters

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Lifecycle status of a watched folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderStatus {
    Active,
    Paused,
    Scanning,
    Error,
}

impl FolderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FolderStatus::Active => "active",
            FolderStatus::Paused => "paused",
            FolderStatus::Scanning => "scanning",
            FolderStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(FolderStatus::Active),
            "paused" => Ok(FolderStatus::Paused),
            "scanning" => Ok(FolderStatus::Scanning),
            "error" => Ok(FolderStatus::Error),
            other => Err(Error::Validation(format!("unknown folder status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WatchedFolder {
    pub id: Uuid,
    pub path: String,
    pub name: String,
    pub status: FolderStatus,
    pub recursive: bool,
    pub auto_approve: bool,
    pub file_count: i64,
    pub analyzed_count: i64,
    pub pending_count: i64,
    pub error_message: Option<String>,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn row_to_folder(row: &SqliteRow) -> Result<WatchedFolder> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let last_scan_at: Option<String> = row.try_get("last_scan_at")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(WatchedFolder {
        id: Uuid::parse_str(&id).map_err(|e| Error::Validation(format!("bad folder id: {}", e)))?,
        path: row.try_get("path")?,
        name: row.try_get("name")?,
        status: FolderStatus::parse(&status)?,
        recursive: row.try_get::<i64, _>("recursive")? != 0,
        auto_approve: row.try_get::<i64, _>("auto_approve")? != 0,
        file_count: row.try_get("file_count")?,
        analyzed_count: row.try_get("analyzed_count")?,
        pending_count: row.try_get("pending_count")?,
        error_message: row.try_get("error_message")?,
        last_scan_at: parse_opt_timestamp(last_scan_at)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Validation(format!("bad timestamp '{}': {}", s, e)))
}

pub(crate) fn parse_opt_timestamp(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.map(|s| parse_timestamp(&s)).transpose()
}

/// Register a new watched folder. The path must not already be registered;
/// a missing display name defaults to the directory's basename.
pub async fn insert_folder(
    pool: &SqlitePool,
    path: &str,
    name: Option<&str>,
    recursive: bool,
    auto_approve: bool,
) -> Result<WatchedFolder> {
    if get_folder_by_path(pool, path).await?.is_some() {
        return Err(Error::Conflict(format!("folder already watched: {}", path)));
    }

    let name = match name {
        Some(n) if !n.trim().is_empty() => n.trim().to_string(),
        _ => std::path::Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(path)
            .to_string(),
    };

    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO watched_folders (id, path, name, status, recursive, auto_approve, created_at, updated_at)
        VALUES (?, ?, ?, 'active', ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(path)
    .bind(&name)
    .bind(recursive as i64)
    .bind(auto_approve as i64)
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(pool)
    .await?;

    get_folder(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("folder {} after insert", id)))
}

pub async fn get_folder(pool: &SqlitePool, id: Uuid) -> Result<Option<WatchedFolder>> {
    let row = sqlx::query("SELECT * FROM watched_folders WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(row_to_folder).transpose()
}

pub async fn get_folder_by_path(pool: &SqlitePool, path: &str) -> Result<Option<WatchedFolder>> {
    let row = sqlx::query("SELECT * FROM watched_folders WHERE path = ?")
        .bind(path)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(row_to_folder).transpose()
}

pub async fn list_folders(pool: &SqlitePool) -> Result<Vec<WatchedFolder>> {
    let rows = sqlx::query("SELECT * FROM watched_folders ORDER BY created_at")
        .fetch_all(pool)
        .await?;
    rows.iter().map(row_to_folder).collect()
}

/// Delete a folder along with its suggestions and activity entries.
/// Imported assets survive with their folder link cleared.
pub async fn delete_folder(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM rename_suggestions WHERE folder_id = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM activity_log WHERE folder_id = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM watched_folders WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

/// Set folder status, clearing or recording the error message.
pub async fn set_folder_status(
    pool: &SqlitePool,
    id: Uuid,
    status: FolderStatus,
    error_message: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "UPDATE watched_folders SET status = ?, error_message = ?, updated_at = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(error_message)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Record scan results: discovered file total and the scan timestamp.
pub async fn record_scan(pool: &SqlitePool, id: Uuid, file_count: i64) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "UPDATE watched_folders SET file_count = ?, last_scan_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(file_count)
    .bind(&now)
    .bind(&now)
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn increment_file_count(pool: &SqlitePool, id: Uuid) -> Result<()> {
    sqlx::query(
        "UPDATE watched_folders SET file_count = file_count + 1, updated_at = ? WHERE id = ?",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Bump analyzed and pending counters after a file finishes the pipeline.
pub async fn record_processed(
    executor: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
    id: Uuid,
    created_suggestion: bool,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE watched_folders
        SET analyzed_count = analyzed_count + 1,
            pending_count = pending_count + ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(created_suggestion as i64)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(executor)
    .await?;
    Ok(())
}

/// Decrement pending_count, clamping at zero.
pub async fn decrement_pending(
    executor: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
    id: Uuid,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE watched_folders
        SET pending_count = MAX(pending_count - 1, 0),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(executor)
    .await?;
    Ok(())
}
