//! Health endpoint

use crate::error::Result;
use crate::AppState;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

pub async fn health(State(state): State<AppState>) -> Result<Json<Value>> {
    // a trivial query doubles as a database liveness check
    sqlx::query("SELECT 1").execute(&state.db).await?;
    let uptime = (Utc::now() - state.startup_time).num_seconds();
    Ok(Json(json!({
        "status": "ok",
        "uptime_secs": uptime,
        "active_watchers": state.watcher.active_watchers(),
        "queue_depth": state.watcher.queue_depth(),
    })))
}
