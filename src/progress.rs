//! Periodic progress broadcasting
//!
//! Samples folder counters on an interval and publishes a snapshot event.
//! Sampling is skipped entirely while nobody is subscribed, so an idle
//! service does not poll the database.

use crate::db::folders;
use crate::events::{EventBus, FolderProgress, ShoeboxEvent};
use crate::watch::WatcherManager;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct ProgressBroadcaster {
    db: SqlitePool,
    event_bus: EventBus,
    manager: Arc<WatcherManager>,
    interval: Duration,
}

impl ProgressBroadcaster {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        manager: Arc<WatcherManager>,
        interval_secs: u64,
    ) -> Self {
        Self {
            db,
            event_bus,
            manager,
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    /// Run until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if self.event_bus.receiver_count() == 0 {
                continue;
            }
            match self.snapshot().await {
                Ok(event) => self.event_bus.emit(event),
                Err(e) => tracing::warn!("progress snapshot failed: {}", e),
            }
        }
        tracing::info!("progress broadcaster stopped");
    }

    async fn snapshot(&self) -> crate::error::Result<ShoeboxEvent> {
        let folders = folders::list_folders(&self.db).await?;
        let folders = folders
            .into_iter()
            .map(|f| FolderProgress {
                progress: folder_progress(f.analyzed_count, f.file_count),
                folder_id: f.id,
                path: f.path,
                status: f.status.as_str().to_string(),
                file_count: f.file_count,
                analyzed_count: f.analyzed_count,
                pending_count: f.pending_count,
            })
            .collect();

        Ok(ShoeboxEvent::ProgressUpdate {
            timestamp: Utc::now(),
            queue_depth: self.manager.queue_depth(),
            active_watchers: self.manager.active_watchers(),
            folders,
        })
    }
}

/// Fraction analyzed, clamped to [0, 1]. An unscanned folder reports 0.
fn folder_progress(analyzed: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (analyzed as f64 / total as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_fraction_clamps() {
        assert_eq!(folder_progress(0, 0), 0.0);
        assert_eq!(folder_progress(5, 10), 0.5);
        assert_eq!(folder_progress(12, 10), 1.0);
        assert_eq!(folder_progress(3, -1), 0.0);
    }
}
