//! HTTP API
//!
//! REST endpoints for folders, suggestions, assets and the activity log,
//! plus an SSE stream of pipeline events.

pub mod activity;
pub mod assets;
pub mod folders;
pub mod health;
pub mod sse;
pub mod suggestions;

use crate::AppState;
use axum::routing::{get, post};
use axum::Router;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/events", get(sse::event_stream))
        .route("/api/folders", get(folders::list).post(folders::add))
        .route(
            "/api/folders/:id",
            get(folders::get_one).delete(folders::remove),
        )
        .route("/api/folders/:id/pause", post(folders::pause))
        .route("/api/folders/:id/resume", post(folders::resume))
        .route("/api/folders/:id/scan", post(folders::scan))
        .route("/api/folders/:id/assets", get(folders::list_assets))
        .route("/api/assets/:id", get(assets::get_one))
        .route("/api/suggestions", get(suggestions::list))
        .route("/api/suggestions/stats", get(suggestions::stats))
        .route(
            "/api/suggestions/:id",
            get(suggestions::get_one).patch(suggestions::amend),
        )
        .route("/api/suggestions/:id/approve", post(suggestions::approve))
        .route("/api/suggestions/:id/reject", post(suggestions::reject))
        .route("/api/suggestions/:id/execute", post(suggestions::execute))
        .route("/api/suggestions/batch", post(suggestions::batch_resolve))
        .route(
            "/api/suggestions/batch/execute",
            post(suggestions::batch_execute),
        )
        .route("/api/activity", get(activity::list))
        .route("/api/activity/:id/rollback", post(activity::rollback))
        .with_state(state)
}
