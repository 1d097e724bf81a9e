//! Watched folder management
//!
//! One notify watcher per active folder feeds a shared bounded queue; a
//! single consumer task drains it through the pipeline. Folder mutations
//! (add, pause, resume, remove, rescan) all go through the manager so the
//! watcher map and the database rows stay in step.

pub mod fs_events;

pub use fs_events::IngestTask;

use crate::config::Settings;
use crate::db::activity::{log_activity, ActivityAction, NewActivity};
use crate::db::folders::{self, FolderStatus, WatchedFolder};
use crate::error::{Error, Result};
use crate::events::{EventBus, ShoeboxEvent};
use crate::pipeline::FileProcessor;
use crate::services::scanner::FolderScanner;
use notify::RecommendedWatcher;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub struct WatcherManager {
    db: SqlitePool,
    event_bus: EventBus,
    processor: Arc<FileProcessor>,
    scanner: FolderScanner,
    watchers: Mutex<HashMap<Uuid, RecommendedWatcher>>,
    queue_tx: mpsc::Sender<IngestTask>,
    queue_rx: Mutex<Option<mpsc::Receiver<IngestTask>>>,
    cancel: CancellationToken,
}

impl WatcherManager {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        settings: &Settings,
        processor: Arc<FileProcessor>,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(settings.queue_capacity);
        Self {
            db,
            event_bus,
            processor,
            scanner: FolderScanner::new(settings.allowed_extensions()),
            watchers: Mutex::new(HashMap::new()),
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
            cancel: CancellationToken::new(),
        }
    }

    /// Spawn the queue consumer and attach watchers for folders that were
    /// active when the service last stopped.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let rx = self
            .queue_rx
            .lock()
            .map_err(|_| Error::Internal(anyhow::anyhow!("queue receiver lock poisoned")))?
            .take()
            .ok_or_else(|| Error::Internal(anyhow::anyhow!("watcher manager already started")))?;

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.consume(rx).await;
        });

        for folder in folders::list_folders(&self.db).await? {
            if folder.status == FolderStatus::Paused {
                continue;
            }
            // a crash mid-scan leaves the row in scanning; recover it
            if folder.status == FolderStatus::Scanning {
                folders::set_folder_status(&self.db, folder.id, FolderStatus::Active, None).await?;
            }
            if let Err(e) = self.attach_watcher(&folder) {
                tracing::warn!("cannot watch {}: {}", folder.path, e);
                folders::set_folder_status(
                    &self.db,
                    folder.id,
                    FolderStatus::Error,
                    Some(&e.to_string()),
                )
                .await?;
            }
        }
        Ok(())
    }

    pub fn stop(&self) {
        self.cancel.cancel();
        if let Ok(mut watchers) = self.watchers.lock() {
            watchers.clear();
        }
    }

    /// Register a folder, start watching it, and kick off an initial scan.
    pub async fn add_folder(
        &self,
        path: &str,
        name: Option<&str>,
        recursive: bool,
        auto_approve: bool,
    ) -> Result<WatchedFolder> {
        if !Path::new(path).is_dir() {
            return Err(Error::Validation(format!("not a directory: {}", path)));
        }
        let folder = folders::insert_folder(&self.db, path, name, recursive, auto_approve).await?;
        self.attach_or_flag(&folder).await?;
        log_activity(
            &self.db,
            ActivityAction::FolderAdded,
            NewActivity {
                folder_id: Some(folder.id),
                new_value: Some(folder.path.clone()),
                success: true,
                detail: Some(folder.name.clone()),
                ..Default::default()
            },
        )
        .await?;
        self.emit_status(folder.id, FolderStatus::Active);
        self.scan_folder(folder.id).await?;
        folders::get_folder(&self.db, folder.id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("folder {}", folder.id)))
    }

    /// Stop watching and delete the folder record along with its
    /// suggestions and activity. Imported assets keep their rows; only
    /// the folder link is cleared.
    pub async fn remove_folder(&self, id: Uuid) -> Result<()> {
        let folder = self.require_folder(id).await?;
        self.detach_watcher(id);
        folders::delete_folder(&self.db, id).await?;
        // logged after the cascade so the removal itself stays on record
        log_activity(
            &self.db,
            ActivityAction::FolderRemoved,
            NewActivity {
                old_value: Some(folder.path),
                success: true,
                detail: Some(folder.name),
                ..Default::default()
            },
        )
        .await?;
        Ok(())
    }

    pub async fn pause_folder(&self, id: Uuid) -> Result<WatchedFolder> {
        let folder = self.require_folder(id).await?;
        if folder.status == FolderStatus::Scanning {
            return Err(Error::Conflict(format!(
                "folder {} is mid-scan, cannot pause",
                id
            )));
        }
        self.detach_watcher(id);
        folders::set_folder_status(&self.db, id, FolderStatus::Paused, None).await?;
        self.emit_status(id, FolderStatus::Paused);
        self.require_folder(id).await
    }

    pub async fn resume_folder(&self, id: Uuid) -> Result<WatchedFolder> {
        let folder = self.require_folder(id).await?;
        if folder.status != FolderStatus::Paused && folder.status != FolderStatus::Error {
            return Err(Error::Conflict(format!(
                "folder {} is {}, nothing to resume",
                id,
                folder.status.as_str()
            )));
        }
        self.attach_or_flag(&folder).await?;
        folders::set_folder_status(&self.db, id, FolderStatus::Active, None).await?;
        self.emit_status(id, FolderStatus::Active);
        self.require_folder(id).await
    }

    /// Enumerate the folder on disk and queue every candidate file. At most
    /// one scan per folder runs at a time.
    pub async fn scan_folder(&self, id: Uuid) -> Result<u64> {
        let folder = self.require_folder(id).await?;
        if folder.status == FolderStatus::Scanning {
            return Err(Error::Conflict(format!(
                "scan already running for folder {}",
                id
            )));
        }
        let root = PathBuf::from(&folder.path);
        if !root.is_dir() {
            let message = format!("folder path missing: {}", folder.path);
            folders::set_folder_status(&self.db, id, FolderStatus::Error, Some(&message)).await?;
            self.emit_status(id, FolderStatus::Error);
            return Err(Error::Validation(message));
        }

        folders::set_folder_status(&self.db, id, FolderStatus::Scanning, None).await?;
        self.emit_status(id, FolderStatus::Scanning);

        let scanner = self.scanner.clone();
        let recursive = folder.recursive;
        let scan = tokio::task::spawn_blocking(move || scanner.scan(&root, recursive))
            .await
            .map_err(|e| Error::Internal(anyhow::anyhow!("scan task: {}", e)));

        let files = match scan {
            Ok(Ok(files)) => files,
            Ok(Err(e)) | Err(e) => {
                folders::set_folder_status(&self.db, id, FolderStatus::Error, Some(&e.to_string()))
                    .await?;
                self.emit_status(id, FolderStatus::Error);
                return Err(e);
            }
        };

        let count = files.len() as u64;
        folders::record_scan(&self.db, id, count as i64).await?;
        log_activity(
            &self.db,
            ActivityAction::Scan,
            NewActivity {
                folder_id: Some(id),
                success: true,
                detail: Some(format!("{} files found", count)),
                ..Default::default()
            },
        )
        .await?;

        for path in files {
            if self
                .queue_tx
                .send(IngestTask { folder_id: id, path })
                .await
                .is_err()
            {
                break;
            }
        }

        folders::set_folder_status(&self.db, id, FolderStatus::Active, None).await?;
        self.emit_status(id, FolderStatus::Active);
        Ok(count)
    }

    /// Entries currently waiting in the ingestion queue.
    pub fn queue_depth(&self) -> usize {
        self.queue_tx.max_capacity() - self.queue_tx.capacity()
    }

    pub fn active_watchers(&self) -> usize {
        self.watchers.lock().map(|w| w.len()).unwrap_or(0)
    }

    async fn consume(self: Arc<Self>, mut rx: mpsc::Receiver<IngestTask>) {
        loop {
            let task = tokio::select! {
                _ = self.cancel.cancelled() => break,
                task = rx.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
            };
            if let Err(e) = self.handle_task(&task).await {
                tracing::warn!("processing {} failed: {}", task.path.display(), e);
                let logged = log_activity(
                    &self.db,
                    ActivityAction::Error,
                    NewActivity {
                        folder_id: Some(task.folder_id),
                        old_value: Some(task.path.to_string_lossy().to_string()),
                        success: false,
                        detail: Some(e.to_string()),
                        ..Default::default()
                    },
                )
                .await;
                if let Err(log_err) = logged {
                    tracing::error!("activity log write failed: {}", log_err);
                }
            }
        }
        tracing::info!("ingestion queue consumer stopped");
    }

    async fn handle_task(&self, task: &IngestTask) -> Result<()> {
        let folder = match folders::get_folder(&self.db, task.folder_id).await? {
            Some(folder) => folder,
            // folder removed while the task sat in the queue
            None => return Ok(()),
        };
        if folder.status == FolderStatus::Paused {
            return Ok(());
        }
        self.event_bus.emit(ShoeboxEvent::FileDetected {
            folder_id: folder.id,
            path: task.path.to_string_lossy().to_string(),
        });
        self.processor.process(&folder, &task.path).await?;
        Ok(())
    }

    /// Attach a watcher; on failure record the folder as errored so the row
    /// never claims to be watched without a live watcher.
    async fn attach_or_flag(&self, folder: &WatchedFolder) -> Result<()> {
        if let Err(e) = self.attach_watcher(folder) {
            folders::set_folder_status(
                &self.db,
                folder.id,
                FolderStatus::Error,
                Some(&e.to_string()),
            )
            .await?;
            self.emit_status(folder.id, FolderStatus::Error);
            return Err(e);
        }
        Ok(())
    }

    fn attach_watcher(&self, folder: &WatchedFolder) -> Result<()> {
        let watcher = fs_events::watch_folder(
            folder.id,
            Path::new(&folder.path),
            folder.recursive,
            self.scanner.clone(),
            self.queue_tx.clone(),
        )?;
        let mut watchers = self
            .watchers
            .lock()
            .map_err(|_| Error::Internal(anyhow::anyhow!("watcher map lock poisoned")))?;
        watchers.insert(folder.id, watcher);
        Ok(())
    }

    fn detach_watcher(&self, id: Uuid) {
        if let Ok(mut watchers) = self.watchers.lock() {
            watchers.remove(&id);
        }
    }

    async fn require_folder(&self, id: Uuid) -> Result<WatchedFolder> {
        folders::get_folder(&self.db, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("folder {}", id)))
    }

    fn emit_status(&self, id: Uuid, status: FolderStatus) {
        self.event_bus.emit(ShoeboxEvent::FolderStatusChanged {
            folder_id: id,
            status: status.as_str().to_string(),
        });
    }
}
