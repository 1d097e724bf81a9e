//! Event bus and event types
//!
//! A single broadcast channel fans events out to SSE subscribers. Emitting
//! with no subscribers is not an error; events are simply dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events published by the ingestion pipeline and rename executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ShoeboxEvent {
    /// A watched folder picked up a new file.
    FileDetected {
        folder_id: Uuid,
        path: String,
    },
    /// A file was imported into managed storage.
    FileImported {
        asset_id: Uuid,
        folder_id: Uuid,
        original_filename: String,
    },
    /// Vision analysis completed for an asset.
    AssetAnalyzed {
        asset_id: Uuid,
        has_description: bool,
        tag_count: usize,
    },
    /// A rename suggestion was generated.
    SuggestionCreated {
        suggestion_id: Uuid,
        asset_id: Uuid,
        suggested_filename: String,
        confidence: f64,
    },
    RenameApplied {
        suggestion_id: Uuid,
        asset_id: Uuid,
        new_filename: String,
    },
    RenameFailed {
        suggestion_id: Uuid,
        asset_id: Uuid,
        reason: String,
    },
    /// A watched folder changed status (active, paused, scanning, error).
    FolderStatusChanged {
        folder_id: Uuid,
        status: String,
    },
    /// Periodic snapshot of watcher and folder progress.
    ProgressUpdate {
        timestamp: DateTime<Utc>,
        queue_depth: usize,
        active_watchers: usize,
        folders: Vec<FolderProgress>,
    },
}

/// Per-folder slice of a progress snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderProgress {
    pub folder_id: Uuid,
    pub path: String,
    pub status: String,
    pub file_count: i64,
    pub analyzed_count: i64,
    pub pending_count: i64,
    /// Fraction of discovered files analyzed, 0.0 to 1.0.
    pub progress: f64,
}

/// Broadcast wrapper shared through application state.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ShoeboxEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShoeboxEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all subscribers. Lagging receivers miss events.
    pub fn emit(&self, event: ShoeboxEvent) {
        // send fails only when there are no receivers, which is fine
        let _ = self.tx.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let folder_id = Uuid::new_v4();
        bus.emit(ShoeboxEvent::FileDetected {
            folder_id,
            path: "/tmp/a.jpg".to_string(),
        });
        match rx.recv().await.unwrap() {
            ShoeboxEvent::FileDetected { folder_id: id, path } => {
                assert_eq!(id, folder_id);
                assert_eq!(path, "/tmp/a.jpg");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn emit_without_subscribers_is_ok() {
        let bus = EventBus::new(8);
        bus.emit(ShoeboxEvent::FolderStatusChanged {
            folder_id: Uuid::new_v4(),
            status: "active".to_string(),
        });
        assert_eq!(bus.receiver_count(), 0);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = ShoeboxEvent::FolderStatusChanged {
            folder_id: Uuid::new_v4(),
            status: "paused".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "FolderStatusChanged");
        assert_eq!(json["status"], "paused");
    }
}
