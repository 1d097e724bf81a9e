//! Rename execution with backup and rollback
//!
//! A rename only runs for an approved suggestion and acts on the asset's
//! working copy. The file is copied aside first; if the rename or the
//! database update fails the backup is restored, so the file is never lost.
//! Every applied rename leaves an activity entry that `rollback` can later
//! invert.

use crate::db::activity::{self, log_activity, ActivityAction, ActivityEntry, NewActivity};
use crate::db::assets;
use crate::db::folders;
use crate::db::suggestions::{self, RenameSuggestion, SuggestionStatus};
use crate::error::{Error, Result};
use crate::events::{EventBus, ShoeboxEvent};
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub struct RenameExecutor {
    db: SqlitePool,
    event_bus: EventBus,
    create_backups: bool,
}

/// Per-item result of a batch execution. `status` is the suggestion's stored
/// status afterwards; `None` when no such suggestion exists.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub suggestion_id: Uuid,
    pub status: Option<SuggestionStatus>,
    pub error: Option<String>,
}

impl RenameExecutor {
    pub fn new(db: SqlitePool, event_bus: EventBus, create_backups: bool) -> Self {
        Self {
            db,
            event_bus,
            create_backups,
        }
    }

    /// Apply an approved suggestion. Precondition failures mark the
    /// suggestion failed and return it; a filesystem failure mid-rename
    /// restores the backup and returns the error.
    pub async fn execute(&self, suggestion_id: Uuid) -> Result<RenameSuggestion> {
        let suggestion = suggestions::get_suggestion(&self.db, suggestion_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("suggestion {}", suggestion_id)))?;

        if suggestion.status != SuggestionStatus::Approved {
            return Err(Error::Conflict(format!(
                "suggestion {} is {}, not approved",
                suggestion_id,
                suggestion.status.as_str()
            )));
        }

        let asset = assets::get_asset(&self.db, suggestion.asset_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("asset {}", suggestion.asset_id)))?;

        // renames touch the working copy, never the watched-folder original
        let source = PathBuf::from(&asset.file_path);
        if !source.is_file() {
            return self
                .fail(&suggestion, format!("working copy missing: {}", source.display()))
                .await;
        }

        let new_filename = corrected_filename(&suggestion.suggested_filename, &source);
        let dest = match source.parent() {
            Some(parent) => parent.join(&new_filename),
            None => {
                return self
                    .fail(&suggestion, format!("no parent directory: {}", source.display()))
                    .await;
            }
        };
        if dest.exists() {
            return self
                .fail(&suggestion, format!("destination exists: {}", dest.display()))
                .await;
        }

        let backup = if self.create_backups {
            let backup = backup_path(&source);
            std::fs::copy(&source, &backup)?;
            Some(backup)
        } else {
            None
        };

        if let Err(e) = std::fs::rename(&source, &dest) {
            self.restore(&source, backup.as_deref());
            let _ = self
                .fail(&suggestion, format!("rename failed: {}", e))
                .await;
            self.event_bus.emit(ShoeboxEvent::RenameFailed {
                suggestion_id,
                asset_id: asset.id,
                reason: e.to_string(),
            });
            return Err(Error::Io(e));
        }

        let commit = self
            .commit_rename(&suggestion, &asset, &source, &dest, &new_filename)
            .await;
        if let Err(e) = commit {
            // undo the on-disk rename so file and catalog stay consistent
            if let Err(undo) = std::fs::rename(&dest, &source) {
                tracing::error!(
                    "failed to undo rename of {} after db error: {}",
                    dest.display(),
                    undo
                );
                self.restore(&source, backup.as_deref());
            }
            let _ = self
                .fail(&suggestion, format!("database update failed: {}", e))
                .await;
            return Err(e);
        }

        if let Some(backup) = backup {
            if let Err(e) = std::fs::remove_file(&backup) {
                tracing::warn!("could not remove backup {}: {}", backup.display(), e);
            }
        }

        self.event_bus.emit(ShoeboxEvent::RenameApplied {
            suggestion_id,
            asset_id: asset.id,
            new_filename,
        });

        suggestions::get_suggestion(&self.db, suggestion_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("suggestion {}", suggestion_id)))
    }

    /// Apply a set of approved suggestions, each independently. One failure
    /// never stops the rest of the batch.
    pub async fn execute_batch(&self, ids: &[Uuid]) -> Vec<BatchItem> {
        let mut results = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.execute(id).await {
                Ok(s) => results.push(BatchItem {
                    suggestion_id: id,
                    status: Some(s.status),
                    error: s.failure_reason,
                }),
                Err(e) => {
                    // report the row as stored, not the attempt's verdict
                    let status = suggestions::get_suggestion(&self.db, id)
                        .await
                        .ok()
                        .flatten()
                        .map(|s| s.status);
                    results.push(BatchItem {
                        suggestion_id: id,
                        status,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        results
    }

    /// Invert a previously applied rename, identified by its activity entry.
    /// The rollback itself is logged as a new entry; history is never edited.
    pub async fn rollback(&self, activity_id: Uuid) -> Result<ActivityEntry> {
        let entry = activity::get_activity(&self.db, activity_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("activity {}", activity_id)))?;

        if entry.action != ActivityAction::Rename || !entry.success {
            return Err(Error::Validation(format!(
                "activity {} is not a successful rename",
                activity_id
            )));
        }
        let (old_path, new_path) = match (&entry.old_value, &entry.new_value) {
            (Some(o), Some(n)) => (PathBuf::from(o), PathBuf::from(n)),
            _ => {
                return Err(Error::Validation(format!(
                    "activity {} has no path pair",
                    activity_id
                )))
            }
        };

        if !new_path.is_file() {
            return Err(Error::Validation(format!(
                "renamed file missing: {}",
                new_path.display()
            )));
        }
        if old_path.exists() {
            return Err(Error::Conflict(format!(
                "original name occupied: {}",
                old_path.display()
            )));
        }

        std::fs::rename(&new_path, &old_path)?;

        let old_filename = old_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Validation(format!("no filename in {}", old_path.display())))?;

        let mut tx = self.db.begin().await?;
        if let Some(asset_id) = entry.asset_id {
            assets::update_location(
                &mut *tx,
                asset_id,
                old_filename,
                &old_path.to_string_lossy(),
            )
            .await?;
        }
        // a rollback is just another rename, with the path pair inverted
        let rollback_id = log_activity(
            &mut *tx,
            ActivityAction::Rename,
            NewActivity {
                asset_id: entry.asset_id,
                folder_id: entry.folder_id,
                old_value: Some(new_path.to_string_lossy().to_string()),
                new_value: Some(old_path.to_string_lossy().to_string()),
                success: true,
                detail: Some(format!("rollback of activity {}", activity_id)),
            },
        )
        .await?;
        tx.commit().await?;

        activity::get_activity(&self.db, rollback_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("activity {}", rollback_id)))
    }

    /// Atomically record a successful rename: asset location, suggestion
    /// status, folder pending counter and the activity entry.
    async fn commit_rename(
        &self,
        suggestion: &RenameSuggestion,
        asset: &assets::Asset,
        source: &Path,
        dest: &Path,
        new_filename: &str,
    ) -> Result<()> {
        let mut tx = self.db.begin().await?;
        assets::update_location(&mut *tx, asset.id, new_filename, &dest.to_string_lossy()).await?;
        suggestions::mark_applied(&mut *tx, suggestion.id).await?;
        if let Some(folder_id) = asset.folder_id {
            folders::decrement_pending(&mut *tx, folder_id).await?;
        }
        log_activity(
            &mut *tx,
            ActivityAction::Rename,
            NewActivity {
                asset_id: Some(asset.id),
                folder_id: asset.folder_id,
                old_value: Some(source.to_string_lossy().to_string()),
                new_value: Some(dest.to_string_lossy().to_string()),
                success: true,
                detail: Some(format!("suggestion {}", suggestion.id)),
            },
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn fail(
        &self,
        suggestion: &RenameSuggestion,
        reason: String,
    ) -> Result<RenameSuggestion> {
        tracing::warn!("rename of suggestion {} failed: {}", suggestion.id, reason);
        suggestions::mark_failed(&self.db, suggestion.id, &reason).await?;
        log_activity(
            &self.db,
            ActivityAction::Rename,
            NewActivity {
                asset_id: Some(suggestion.asset_id),
                folder_id: suggestion.folder_id,
                success: false,
                detail: Some(reason),
                ..Default::default()
            },
        )
        .await?;
        suggestions::get_suggestion(&self.db, suggestion.id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("suggestion {}", suggestion.id)))
    }

    fn restore(&self, source: &Path, backup: Option<&Path>) {
        if let Some(backup) = backup {
            if !source.exists() {
                if let Err(e) = std::fs::copy(backup, source) {
                    tracing::error!(
                        "backup restore failed for {}: {}",
                        source.display(),
                        e
                    );
                    return;
                }
            }
            let _ = std::fs::remove_file(backup);
        }
    }
}

/// Sibling path used for the pre-rename backup copy.
fn backup_path(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_os_string();
    name.push(".backup");
    PathBuf::from(name)
}

/// Ensure the suggested name keeps the source file's extension.
fn corrected_filename(suggested: &str, source: &Path) -> String {
    let source_ext = match source.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.to_lowercase(),
        None => return suggested.to_string(),
    };
    let keeps_ext = Path::new(suggested)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase() == source_ext)
        .unwrap_or(false);
    if keeps_ext {
        suggested.to_string()
    } else {
        format!("{}.{}", suggested, source_ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrected_filename_appends_missing_extension() {
        let src = Path::new("/x/IMG_0001.JPG");
        assert_eq!(corrected_filename("dog_beach", src), "dog_beach.jpg");
        assert_eq!(corrected_filename("dog_beach.jpg", src), "dog_beach.jpg");
        assert_eq!(corrected_filename("dog.v2", src), "dog.v2.jpg");
    }

    #[test]
    fn backup_path_is_sibling() {
        assert_eq!(
            backup_path(Path::new("/x/a.jpg")),
            PathBuf::from("/x/a.jpg.backup")
        );
    }
}
