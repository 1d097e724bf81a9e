//! Imported asset records
//!
//! `tags` and `objects` are stored as JSON arrays in TEXT columns.

use crate::db::folders::{parse_opt_timestamp, parse_timestamp};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Asset {
    pub id: Uuid,
    pub folder_id: Option<Uuid>,
    pub project: String,
    pub original_filename: String,
    pub current_filename: String,
    /// Absolute path the file was imported from; the idempotence key.
    pub source_path: String,
    /// Immutable originals copy, relative to the storage root.
    pub stored_path: String,
    /// Absolute path of the working copy, the file renames operate on.
    pub file_path: String,
    pub media_type: String,
    pub file_size: i64,
    pub content_hash: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub duration_secs: Option<f64>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub objects: Vec<String>,
    pub scene: Option<String>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields captured at import time, before any analysis runs.
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub folder_id: Option<Uuid>,
    pub project: String,
    pub original_filename: String,
    pub source_path: String,
    pub stored_path: String,
    pub file_path: String,
    pub media_type: String,
    pub file_size: i64,
    pub content_hash: Option<String>,
}

fn parse_string_list(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

fn row_to_asset(row: &SqliteRow) -> Result<Asset> {
    let id: String = row.try_get("id")?;
    let folder_id: Option<String> = row.try_get("folder_id")?;
    let analyzed_at: Option<String> = row.try_get("analyzed_at")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Asset {
        id: Uuid::parse_str(&id).map_err(|e| Error::Validation(format!("bad asset id: {}", e)))?,
        folder_id: folder_id
            .map(|s| Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| Error::Validation(format!("bad folder id: {}", e)))?,
        project: row.try_get("project")?,
        original_filename: row.try_get("original_filename")?,
        current_filename: row.try_get("current_filename")?,
        source_path: row.try_get("source_path")?,
        stored_path: row.try_get("stored_path")?,
        file_path: row.try_get("file_path")?,
        media_type: row.try_get("media_type")?,
        file_size: row.try_get("file_size")?,
        content_hash: row.try_get("content_hash")?,
        width: row.try_get("width")?,
        height: row.try_get("height")?,
        duration_secs: row.try_get("duration_secs")?,
        description: row.try_get("description")?,
        tags: parse_string_list(row.try_get("tags")?),
        objects: parse_string_list(row.try_get("objects")?),
        scene: row.try_get("scene")?,
        analyzed_at: parse_opt_timestamp(analyzed_at)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

/// Insert a newly imported asset. The current filename starts as the original.
pub async fn insert_asset(pool: &SqlitePool, new: &NewAsset) -> Result<Asset> {
    let id = Uuid::new_v4();
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        INSERT INTO assets (
            id, folder_id, project, original_filename, current_filename,
            source_path, stored_path, file_path, media_type, file_size,
            content_hash, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(new.folder_id.map(|f| f.to_string()))
    .bind(&new.project)
    .bind(&new.original_filename)
    .bind(&new.original_filename)
    .bind(&new.source_path)
    .bind(&new.stored_path)
    .bind(&new.file_path)
    .bind(&new.media_type)
    .bind(new.file_size)
    .bind(&new.content_hash)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    get_asset(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("asset {} after insert", id)))
}

pub async fn get_asset(pool: &SqlitePool, id: Uuid) -> Result<Option<Asset>> {
    let row = sqlx::query("SELECT * FROM assets WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(row_to_asset).transpose()
}

/// Look up an asset by the path it was imported from. Used for idempotent
/// re-scans of the same folder.
pub async fn get_asset_by_source_path(pool: &SqlitePool, path: &str) -> Result<Option<Asset>> {
    let row = sqlx::query("SELECT * FROM assets WHERE source_path = ?")
        .bind(path)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(row_to_asset).transpose()
}

pub async fn list_assets_for_folder(pool: &SqlitePool, folder_id: Uuid) -> Result<Vec<Asset>> {
    let rows = sqlx::query("SELECT * FROM assets WHERE folder_id = ? ORDER BY created_at")
        .bind(folder_id.to_string())
        .fetch_all(pool)
        .await?;
    rows.iter().map(row_to_asset).collect()
}

/// Record probe dimensions and duration.
pub async fn update_media_info(
    pool: &SqlitePool,
    id: Uuid,
    width: Option<i64>,
    height: Option<i64>,
    duration_secs: Option<f64>,
) -> Result<()> {
    sqlx::query(
        "UPDATE assets SET width = ?, height = ?, duration_secs = ?, updated_at = ? WHERE id = ?",
    )
    .bind(width)
    .bind(height)
    .bind(duration_secs)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Record vision analysis output for an asset.
pub async fn update_analysis(
    pool: &SqlitePool,
    id: Uuid,
    description: Option<&str>,
    tags: &[String],
    objects: &[String],
    scene: Option<&str>,
) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        UPDATE assets
        SET description = ?, tags = ?, objects = ?, scene = ?, analyzed_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(description)
    .bind(serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string()))
    .bind(serde_json::to_string(objects).unwrap_or_else(|_| "[]".to_string()))
    .bind(scene)
    .bind(&now)
    .bind(&now)
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Update filename and working-copy path after a rename on disk.
pub async fn update_location(
    executor: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
    id: Uuid,
    current_filename: &str,
    file_path: &str,
) -> Result<()> {
    sqlx::query(
        "UPDATE assets SET current_filename = ?, file_path = ?, updated_at = ? WHERE id = ?",
    )
    .bind(current_filename)
    .bind(file_path)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(executor)
    .await?;
    Ok(())
}
