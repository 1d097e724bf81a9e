//! notify-based filesystem event source
//!
//! One watcher per watched folder. The notify callback runs on its own
//! thread, so detected paths cross into the async world over a bounded
//! channel with `blocking_send`. Dropping the watcher stops delivery.

use crate::error::{Error, Result};
use crate::services::scanner::FolderScanner;
use notify::event::{EventKind, ModifyKind};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use uuid::Uuid;

/// A file queued for the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct IngestTask {
    pub folder_id: Uuid,
    pub path: PathBuf,
}

/// Start watching `path`, sending candidate files to `tx`.
pub fn watch_folder(
    folder_id: Uuid,
    path: &Path,
    recursive: bool,
    scanner: FolderScanner,
    tx: mpsc::Sender<IngestTask>,
) -> Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("watch error for folder {}: {}", folder_id, e);
                return;
            }
        };
        if !is_arrival(&event.kind) {
            return;
        }
        for path in event.paths {
            if !scanner.is_candidate(&path) {
                continue;
            }
            let task = IngestTask {
                folder_id,
                path: path.clone(),
            };
            if tx.blocking_send(task).is_err() {
                tracing::debug!("ingestion queue closed, dropping {}", path.display());
                return;
            }
        }
    })
    .map_err(|e| Error::Internal(anyhow::anyhow!("create watcher: {}", e)))?;

    let mode = if recursive {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };
    watcher
        .watch(path, mode)
        .map_err(|e| Error::Validation(format!("watch {}: {}", path.display(), e)))?;

    Ok(watcher)
}

/// New file creations, plus renames into the folder.
fn is_arrival(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RenameMode};

    #[test]
    fn arrival_kinds() {
        assert!(is_arrival(&EventKind::Create(CreateKind::File)));
        assert!(is_arrival(&EventKind::Modify(ModifyKind::Name(
            RenameMode::To
        ))));
        assert!(!is_arrival(&EventKind::Modify(ModifyKind::Data(
            DataChange::Content
        ))));
        assert!(!is_arrival(&EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::Any
        ))));
        assert!(!is_arrival(&EventKind::Remove(
            notify::event::RemoveKind::File
        )));
    }

    #[tokio::test]
    async fn created_file_reaches_channel() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let scanner = FolderScanner::new(vec!["jpg".to_string()]);
        let folder_id = Uuid::new_v4();
        let _watcher = watch_folder(folder_id, dir.path(), true, scanner, tx).unwrap();

        let file = dir.path().join("new.jpg");
        tokio::task::spawn_blocking(move || std::fs::write(file, b"x").unwrap())
            .await
            .unwrap();

        let task = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("watcher event")
            .expect("channel open");
        assert_eq!(task.folder_id, folder_id);
        assert!(task.path.ends_with("new.jpg"));
    }
}
