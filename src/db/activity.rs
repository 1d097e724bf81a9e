//! Append-only activity log
//!
//! Every folder change, import, scan, review decision and rename leaves a
//! row here. A rollback is recorded as a fresh rename entry with the path
//! pair inverted; entries are never updated or deleted.

use crate::db::folders::parse_timestamp;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Import,
    Scan,
    Rename,
    Approve,
    Reject,
    Error,
    FolderAdded,
    FolderRemoved,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Import => "import",
            ActivityAction::Scan => "scan",
            ActivityAction::Rename => "rename",
            ActivityAction::Approve => "approve",
            ActivityAction::Reject => "reject",
            ActivityAction::Error => "error",
            ActivityAction::FolderAdded => "folder_added",
            ActivityAction::FolderRemoved => "folder_removed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "import" => Ok(ActivityAction::Import),
            "scan" => Ok(ActivityAction::Scan),
            "rename" => Ok(ActivityAction::Rename),
            "approve" => Ok(ActivityAction::Approve),
            "reject" => Ok(ActivityAction::Reject),
            "error" => Ok(ActivityAction::Error),
            "folder_added" => Ok(ActivityAction::FolderAdded),
            "folder_removed" => Ok(ActivityAction::FolderRemoved),
            other => Err(Error::Validation(format!("unknown activity action: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub asset_id: Option<Uuid>,
    pub folder_id: Option<Uuid>,
    pub action: ActivityAction,
    /// For renames, the absolute path before the operation.
    pub old_value: Option<String>,
    /// For renames, the absolute path after the operation.
    pub new_value: Option<String>,
    pub success: bool,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new log entry; the id and timestamp are assigned on insert.
#[derive(Debug, Clone, Default)]
pub struct NewActivity {
    pub asset_id: Option<Uuid>,
    pub folder_id: Option<Uuid>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub success: bool,
    pub detail: Option<String>,
}

fn row_to_entry(row: &SqliteRow) -> Result<ActivityEntry> {
    let id: String = row.try_get("id")?;
    let asset_id: Option<String> = row.try_get("asset_id")?;
    let folder_id: Option<String> = row.try_get("folder_id")?;
    let action: String = row.try_get("action")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(ActivityEntry {
        id: Uuid::parse_str(&id)
            .map_err(|e| Error::Validation(format!("bad activity id: {}", e)))?,
        asset_id: asset_id
            .map(|s| Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| Error::Validation(format!("bad asset id: {}", e)))?,
        folder_id: folder_id
            .map(|s| Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| Error::Validation(format!("bad folder id: {}", e)))?,
        action: ActivityAction::parse(&action)?,
        old_value: row.try_get("old_value")?,
        new_value: row.try_get("new_value")?,
        success: row.try_get::<i64, _>("success")? != 0,
        detail: row.try_get("detail")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Append an entry, returning its id. Accepts a transaction executor so log
/// writes can commit atomically with the change they record.
pub async fn log_activity(
    executor: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
    action: ActivityAction,
    entry: NewActivity,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO activity_log (
            id, asset_id, folder_id, action, old_value, new_value,
            success, detail, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(entry.asset_id.map(|a| a.to_string()))
    .bind(entry.folder_id.map(|f| f.to_string()))
    .bind(action.as_str())
    .bind(entry.old_value)
    .bind(entry.new_value)
    .bind(entry.success as i64)
    .bind(entry.detail)
    .bind(Utc::now().to_rfc3339())
    .execute(executor)
    .await?;
    Ok(id)
}

pub async fn get_activity(pool: &SqlitePool, id: Uuid) -> Result<Option<ActivityEntry>> {
    let row = sqlx::query("SELECT * FROM activity_log WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(row_to_entry).transpose()
}

pub async fn list_activity(
    pool: &SqlitePool,
    asset_id: Option<Uuid>,
    action: Option<ActivityAction>,
    limit: i64,
) -> Result<Vec<ActivityEntry>> {
    let rows = match (asset_id, action) {
        (Some(a), Some(act)) => {
            sqlx::query(
                "SELECT * FROM activity_log WHERE asset_id = ? AND action = ? \
                 ORDER BY created_at DESC LIMIT ?",
            )
            .bind(a.to_string())
            .bind(act.as_str())
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        (Some(a), None) => {
            sqlx::query(
                "SELECT * FROM activity_log WHERE asset_id = ? \
                 ORDER BY created_at DESC LIMIT ?",
            )
            .bind(a.to_string())
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        (None, Some(act)) => {
            sqlx::query(
                "SELECT * FROM activity_log WHERE action = ? \
                 ORDER BY created_at DESC LIMIT ?",
            )
            .bind(act.as_str())
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        (None, None) => {
            sqlx::query("SELECT * FROM activity_log ORDER BY created_at DESC LIMIT ?")
                .bind(limit)
                .fetch_all(pool)
                .await?
        }
    };
    rows.iter().map(row_to_entry).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    #[tokio::test]
    async fn log_and_fetch() {
        let pool = init_memory_pool().await.unwrap();
        let id = log_activity(
            &pool,
            ActivityAction::Rename,
            NewActivity {
                old_value: Some("/a/old.jpg".to_string()),
                new_value: Some("/a/new.jpg".to_string()),
                success: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let entry = get_activity(&pool, id).await.unwrap().unwrap();
        assert_eq!(entry.action, ActivityAction::Rename);
        assert_eq!(entry.old_value.as_deref(), Some("/a/old.jpg"));
        assert!(entry.success);
    }

    #[tokio::test]
    async fn list_filters_by_action() {
        let pool = init_memory_pool().await.unwrap();
        log_activity(&pool, ActivityAction::Scan, NewActivity { success: true, ..Default::default() })
            .await
            .unwrap();
        log_activity(&pool, ActivityAction::Rename, NewActivity { success: true, ..Default::default() })
            .await
            .unwrap();

        let renames = list_activity(&pool, None, Some(ActivityAction::Rename), 50)
            .await
            .unwrap();
        assert_eq!(renames.len(), 1);
        let all = list_activity(&pool, None, None, 50).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
