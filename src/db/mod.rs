//! Database access layer
//!
//! SQLite via sqlx. Identifiers are stored as TEXT UUIDs and timestamps as
//! RFC 3339 TEXT so rows stay readable with the sqlite3 CLI.

pub mod activity;
pub mod assets;
pub mod folders;
pub mod suggestions;

use crate::error::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

/// Open (creating if needed) the SQLite database and prepare the schema.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    let url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// In-memory pool for tests.
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    init_tables(&pool).await?;
    Ok(pool)
}

async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS watched_folders (
            id TEXT PRIMARY KEY,
            path TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            recursive INTEGER NOT NULL DEFAULT 1,
            auto_approve INTEGER NOT NULL DEFAULT 0,
            file_count INTEGER NOT NULL DEFAULT 0,
            analyzed_count INTEGER NOT NULL DEFAULT 0,
            pending_count INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            last_scan_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assets (
            id TEXT PRIMARY KEY,
            folder_id TEXT REFERENCES watched_folders(id) ON DELETE SET NULL,
            project TEXT NOT NULL,
            original_filename TEXT NOT NULL,
            current_filename TEXT NOT NULL,
            source_path TEXT NOT NULL UNIQUE,
            stored_path TEXT NOT NULL,
            file_path TEXT NOT NULL,
            media_type TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            content_hash TEXT,
            width INTEGER,
            height INTEGER,
            duration_secs REAL,
            description TEXT,
            tags TEXT,
            objects TEXT,
            scene TEXT,
            analyzed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rename_suggestions (
            id TEXT PRIMARY KEY,
            asset_id TEXT NOT NULL REFERENCES assets(id) ON DELETE CASCADE,
            folder_id TEXT,
            original_path TEXT NOT NULL,
            current_filename TEXT NOT NULL,
            suggested_filename TEXT NOT NULL,
            confidence REAL NOT NULL,
            reasoning TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            failure_reason TEXT,
            created_at TEXT NOT NULL,
            resolved_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS activity_log (
            id TEXT PRIMARY KEY,
            asset_id TEXT REFERENCES assets(id) ON DELETE SET NULL,
            folder_id TEXT,
            action TEXT NOT NULL,
            old_value TEXT,
            new_value TEXT,
            success INTEGER NOT NULL DEFAULT 1,
            detail TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    for stmt in [
        "CREATE INDEX IF NOT EXISTS idx_assets_folder ON assets(folder_id)",
        "CREATE INDEX IF NOT EXISTS idx_assets_source_path ON assets(source_path)",
        "CREATE INDEX IF NOT EXISTS idx_suggestions_asset ON rename_suggestions(asset_id)",
        "CREATE INDEX IF NOT EXISTS idx_suggestions_folder ON rename_suggestions(folder_id)",
        "CREATE INDEX IF NOT EXISTS idx_suggestions_status ON rename_suggestions(status)",
        "CREATE INDEX IF NOT EXISTS idx_activity_asset ON activity_log(asset_id)",
        "CREATE INDEX IF NOT EXISTS idx_activity_created ON activity_log(created_at)",
    ] {
        sqlx::query(stmt).execute(pool).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_creates_cleanly() {
        let pool = init_memory_pool().await.unwrap();
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM watched_folders")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count.0, 0);
    }
}
