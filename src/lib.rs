//! shoebox - watched-folder media organizer
//!
//! Watches folders for new images and videos, imports them into managed
//! storage, runs vision analysis, and proposes descriptive filenames that a
//! reviewer approves before anything is renamed on disk.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod progress;
pub mod services;
pub mod storage;
pub mod watch;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

pub use api::build_router;
pub use config::Settings;
pub use events::EventBus;

/// Shared application state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub event_bus: EventBus,
    pub settings: Arc<Settings>,
    pub watcher: Arc<watch::WatcherManager>,
    pub executor: Arc<pipeline::RenameExecutor>,
    pub startup_time: DateTime<Utc>,
}
