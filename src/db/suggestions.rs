//! Rename suggestion lifecycle
//!
//! Status machine: pending -> approved | rejected | superseded,
//! approved -> applied | failed. Resolved suggestions are immutable.

use crate::db::activity::{log_activity, ActivityAction, NewActivity};
use crate::db::folders::{parse_opt_timestamp, parse_timestamp};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    Pending,
    Approved,
    Rejected,
    Applied,
    Failed,
    Superseded,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Approved => "approved",
            SuggestionStatus::Rejected => "rejected",
            SuggestionStatus::Applied => "applied",
            SuggestionStatus::Failed => "failed",
            SuggestionStatus::Superseded => "superseded",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(SuggestionStatus::Pending),
            "approved" => Ok(SuggestionStatus::Approved),
            "rejected" => Ok(SuggestionStatus::Rejected),
            "applied" => Ok(SuggestionStatus::Applied),
            "failed" => Ok(SuggestionStatus::Failed),
            "superseded" => Ok(SuggestionStatus::Superseded),
            other => Err(Error::Validation(format!(
                "unknown suggestion status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenameSuggestion {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub folder_id: Option<Uuid>,
    /// Path of the file the suggestion was generated against.
    pub original_path: String,
    pub current_filename: String,
    pub suggested_filename: String,
    pub confidence: f64,
    pub reasoning: Option<String>,
    pub status: SuggestionStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

fn row_to_suggestion(row: &SqliteRow) -> Result<RenameSuggestion> {
    let id: String = row.try_get("id")?;
    let asset_id: String = row.try_get("asset_id")?;
    let folder_id: Option<String> = row.try_get("folder_id")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let resolved_at: Option<String> = row.try_get("resolved_at")?;

    Ok(RenameSuggestion {
        id: Uuid::parse_str(&id)
            .map_err(|e| Error::Validation(format!("bad suggestion id: {}", e)))?,
        asset_id: Uuid::parse_str(&asset_id)
            .map_err(|e| Error::Validation(format!("bad asset id: {}", e)))?,
        folder_id: folder_id
            .map(|s| Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| Error::Validation(format!("bad folder id: {}", e)))?,
        original_path: row.try_get("original_path")?,
        current_filename: row.try_get("current_filename")?,
        suggested_filename: row.try_get("suggested_filename")?,
        confidence: row.try_get("confidence")?,
        reasoning: row.try_get("reasoning")?,
        status: SuggestionStatus::parse(&status)?,
        failure_reason: row.try_get("failure_reason")?,
        created_at: parse_timestamp(&created_at)?,
        resolved_at: parse_opt_timestamp(resolved_at)?,
    })
}

/// Create a suggestion for an asset, superseding any pending one first so an
/// asset never has two live suggestions.
pub async fn create_suggestion(
    pool: &SqlitePool,
    asset_id: Uuid,
    folder_id: Option<Uuid>,
    original_path: &str,
    current_filename: &str,
    suggested_filename: &str,
    confidence: f64,
    reasoning: Option<&str>,
) -> Result<RenameSuggestion> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE rename_suggestions
        SET status = 'superseded', resolved_at = ?
        WHERE asset_id = ? AND status = 'pending'
        "#,
    )
    .bind(Utc::now().to_rfc3339())
    .bind(asset_id.to_string())
    .execute(&mut *tx)
    .await?;

    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO rename_suggestions (
            id, asset_id, folder_id, original_path, current_filename,
            suggested_filename, confidence, reasoning, status, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?)
        "#,
    )
    .bind(id.to_string())
    .bind(asset_id.to_string())
    .bind(folder_id.map(|f| f.to_string()))
    .bind(original_path)
    .bind(current_filename)
    .bind(suggested_filename)
    .bind(confidence)
    .bind(reasoning)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    get_suggestion(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("suggestion {} after insert", id)))
}

pub async fn get_suggestion(pool: &SqlitePool, id: Uuid) -> Result<Option<RenameSuggestion>> {
    let row = sqlx::query("SELECT * FROM rename_suggestions WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(row_to_suggestion).transpose()
}

/// Optional narrowing criteria for suggestion listings. Unset fields match
/// everything.
#[derive(Debug, Clone, Default)]
pub struct SuggestionFilter {
    pub status: Option<SuggestionStatus>,
    pub asset_id: Option<Uuid>,
    pub folder_id: Option<Uuid>,
    pub min_confidence: Option<f64>,
}

pub async fn list_suggestions(
    pool: &SqlitePool,
    filter: &SuggestionFilter,
    limit: i64,
) -> Result<Vec<RenameSuggestion>> {
    let mut sql = String::from("SELECT * FROM rename_suggestions WHERE 1 = 1");
    if filter.status.is_some() {
        sql.push_str(" AND status = ?");
    }
    if filter.asset_id.is_some() {
        sql.push_str(" AND asset_id = ?");
    }
    if filter.folder_id.is_some() {
        sql.push_str(" AND folder_id = ?");
    }
    if filter.min_confidence.is_some() {
        sql.push_str(" AND confidence >= ?");
    }
    sql.push_str(" ORDER BY created_at DESC LIMIT ?");

    let mut query = sqlx::query(&sql);
    if let Some(status) = filter.status {
        query = query.bind(status.as_str());
    }
    if let Some(asset_id) = filter.asset_id {
        query = query.bind(asset_id.to_string());
    }
    if let Some(folder_id) = filter.folder_id {
        query = query.bind(folder_id.to_string());
    }
    if let Some(min) = filter.min_confidence {
        query = query.bind(min);
    }
    let rows = query.bind(limit).fetch_all(pool).await?;
    rows.iter().map(row_to_suggestion).collect()
}

/// Transition a pending suggestion to approved or rejected, writing the
/// matching audit entry in the same transaction. Any other current status
/// is a conflict. No filesystem side effects.
pub async fn resolve_pending(
    pool: &SqlitePool,
    id: Uuid,
    target: SuggestionStatus,
) -> Result<RenameSuggestion> {
    debug_assert!(matches!(
        target,
        SuggestionStatus::Approved | SuggestionStatus::Rejected
    ));

    let mut tx = pool.begin().await?;
    let result = sqlx::query(
        "UPDATE rename_suggestions SET status = ?, resolved_at = ? \
         WHERE id = ? AND status = 'pending'",
    )
    .bind(target.as_str())
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        drop(tx);
        return match get_suggestion(pool, id).await? {
            Some(s) => Err(Error::Conflict(format!(
                "suggestion {} is {}, not pending",
                id,
                s.status.as_str()
            ))),
            None => Err(Error::NotFound(format!("suggestion {}", id))),
        };
    }

    let row = sqlx::query("SELECT * FROM rename_suggestions WHERE id = ?")
        .bind(id.to_string())
        .fetch_one(&mut *tx)
        .await?;
    let suggestion = row_to_suggestion(&row)?;

    let action = if target == SuggestionStatus::Approved {
        ActivityAction::Approve
    } else {
        ActivityAction::Reject
    };
    log_activity(
        &mut *tx,
        action,
        NewActivity {
            asset_id: Some(suggestion.asset_id),
            folder_id: suggestion.folder_id,
            old_value: Some(suggestion.current_filename.clone()),
            new_value: Some(suggestion.suggested_filename.clone()),
            success: true,
            detail: None,
        },
    )
    .await?;
    tx.commit().await?;

    Ok(suggestion)
}

/// Amend the suggested filename of a pending suggestion.
pub async fn update_suggested_filename(
    pool: &SqlitePool,
    id: Uuid,
    suggested_filename: &str,
) -> Result<RenameSuggestion> {
    let result = sqlx::query(
        "UPDATE rename_suggestions SET suggested_filename = ? \
         WHERE id = ? AND status = 'pending'",
    )
    .bind(suggested_filename)
    .bind(id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return match get_suggestion(pool, id).await? {
            Some(s) => Err(Error::Conflict(format!(
                "suggestion {} is {}, not pending",
                id,
                s.status.as_str()
            ))),
            None => Err(Error::NotFound(format!("suggestion {}", id))),
        };
    }

    get_suggestion(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("suggestion {}", id)))
}

/// Mark an approved suggestion applied. Runs inside the executor's rename
/// transaction.
pub async fn mark_applied(
    executor: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
    id: Uuid,
) -> Result<()> {
    sqlx::query(
        "UPDATE rename_suggestions SET status = 'applied', resolved_at = ? WHERE id = ?",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn mark_failed(pool: &SqlitePool, id: Uuid, reason: &str) -> Result<()> {
    sqlx::query(
        "UPDATE rename_suggestions SET status = 'failed', failure_reason = ?, resolved_at = ? \
         WHERE id = ?",
    )
    .bind(reason)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Aggregate counts per status plus mean confidence of pending suggestions.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestionStats {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub applied: i64,
    pub failed: i64,
    pub superseded: i64,
    pub avg_pending_confidence: Option<f64>,
}

pub async fn suggestion_stats(pool: &SqlitePool) -> Result<SuggestionStats> {
    let rows = sqlx::query(
        "SELECT status, COUNT(*) AS n FROM rename_suggestions GROUP BY status",
    )
    .fetch_all(pool)
    .await?;

    let mut stats = SuggestionStats {
        pending: 0,
        approved: 0,
        rejected: 0,
        applied: 0,
        failed: 0,
        superseded: 0,
        avg_pending_confidence: None,
    };
    for row in &rows {
        let status: String = row.try_get("status")?;
        let n: i64 = row.try_get("n")?;
        match status.as_str() {
            "pending" => stats.pending = n,
            "approved" => stats.approved = n,
            "rejected" => stats.rejected = n,
            "applied" => stats.applied = n,
            "failed" => stats.failed = n,
            "superseded" => stats.superseded = n,
            _ => {}
        }
    }

    let avg: (Option<f64>,) = sqlx::query_as(
        "SELECT AVG(confidence) FROM rename_suggestions WHERE status = 'pending'",
    )
    .fetch_one(pool)
    .await?;
    stats.avg_pending_confidence = avg.0;

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::assets::{insert_asset, NewAsset};
    use crate::db::init_memory_pool;

    async fn seed_asset_at(pool: &SqlitePool, source_path: &str) -> Uuid {
        let asset = insert_asset(
            pool,
            &NewAsset {
                folder_id: None,
                project: "general".to_string(),
                original_filename: "IMG_0001.jpg".to_string(),
                source_path: source_path.to_string(),
                stored_path: "originals/x/IMG_0001.jpg".to_string(),
                file_path: "/data/sb/working/x/IMG_0001.jpg".to_string(),
                media_type: "image".to_string(),
                file_size: 10,
                content_hash: None,
            },
        )
        .await
        .unwrap();
        asset.id
    }

    async fn seed_asset(pool: &SqlitePool) -> Uuid {
        seed_asset_at(pool, "/media/inbox/IMG_0001.jpg").await
    }

    #[tokio::test]
    async fn new_suggestion_supersedes_pending() {
        let pool = init_memory_pool().await.unwrap();
        let asset_id = seed_asset(&pool).await;

        let first = create_suggestion(&pool, asset_id, None, "/inbox/a.jpg", "a.jpg", "dog_beach.jpg", 0.8, None)
            .await
            .unwrap();
        let second = create_suggestion(&pool, asset_id, None, "/inbox/a.jpg", "a.jpg", "dog_sunset.jpg", 0.9, None)
            .await
            .unwrap();

        let first = get_suggestion(&pool, first.id).await.unwrap().unwrap();
        assert_eq!(first.status, SuggestionStatus::Superseded);
        assert!(first.resolved_at.is_some());
        assert_eq!(second.status, SuggestionStatus::Pending);
    }

    #[tokio::test]
    async fn approve_requires_pending() {
        let pool = init_memory_pool().await.unwrap();
        let asset_id = seed_asset(&pool).await;
        let s = create_suggestion(&pool, asset_id, None, "/inbox/a.jpg", "a.jpg", "b.jpg", 0.7, None)
            .await
            .unwrap();

        let approved = resolve_pending(&pool, s.id, SuggestionStatus::Approved)
            .await
            .unwrap();
        assert_eq!(approved.status, SuggestionStatus::Approved);

        let err = resolve_pending(&pool, s.id, SuggestionStatus::Rejected)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn reject_is_terminal() {
        let pool = init_memory_pool().await.unwrap();
        let asset_id = seed_asset(&pool).await;
        let s = create_suggestion(&pool, asset_id, None, "/inbox/a.jpg", "a.jpg", "b.jpg", 0.7, None)
            .await
            .unwrap();
        resolve_pending(&pool, s.id, SuggestionStatus::Rejected)
            .await
            .unwrap();
        let err = update_suggested_filename(&pool, s.id, "c.jpg").await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn list_narrows_by_folder_and_confidence_floor() {
        let pool = init_memory_pool().await.unwrap();
        let a1 = seed_asset_at(&pool, "/media/inbox/a.jpg").await;
        let a2 = seed_asset_at(&pool, "/media/vacation/b.jpg").await;
        let inbox = Uuid::new_v4();
        let vacation = Uuid::new_v4();
        let low = create_suggestion(&pool, a1, Some(inbox), "/media/inbox/a.jpg", "a.jpg", "misc.jpg", 0.3, None)
            .await
            .unwrap();
        let high = create_suggestion(&pool, a2, Some(vacation), "/media/vacation/b.jpg", "b.jpg", "dunes.jpg", 0.8, None)
            .await
            .unwrap();

        let by_folder = list_suggestions(
            &pool,
            &SuggestionFilter {
                folder_id: Some(inbox),
                ..Default::default()
            },
            10,
        )
        .await
        .unwrap();
        assert_eq!(by_folder.len(), 1);
        assert_eq!(by_folder[0].id, low.id);

        let confident = list_suggestions(
            &pool,
            &SuggestionFilter {
                min_confidence: Some(0.5),
                ..Default::default()
            },
            10,
        )
        .await
        .unwrap();
        assert_eq!(confident.len(), 1);
        assert_eq!(confident[0].id, high.id);

        let both = list_suggestions(
            &pool,
            &SuggestionFilter {
                folder_id: Some(inbox),
                min_confidence: Some(0.5),
                ..Default::default()
            },
            10,
        )
        .await
        .unwrap();
        assert!(both.is_empty());
    }

    #[tokio::test]
    async fn stats_count_per_status() {
        let pool = init_memory_pool().await.unwrap();
        let a1 = seed_asset(&pool).await;
        let s1 = create_suggestion(&pool, a1, None, "/inbox/a.jpg", "a.jpg", "b.jpg", 0.6, None)
            .await
            .unwrap();
        resolve_pending(&pool, s1.id, SuggestionStatus::Approved)
            .await
            .unwrap();
        create_suggestion(&pool, a1, None, "/inbox/a.jpg", "a.jpg", "c.jpg", 0.8, None)
            .await
            .unwrap();

        let stats = suggestion_stats(&pool).await.unwrap();
        assert_eq!(stats.approved, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.avg_pending_confidence, Some(0.8));
    }
}
