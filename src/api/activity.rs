//! Activity log endpoints

use crate::db::activity::{self, ActivityAction};
use crate::error::Result;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

const DEFAULT_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub asset_id: Option<Uuid>,
    pub action: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>> {
    let action = query
        .action
        .as_deref()
        .map(ActivityAction::parse)
        .transpose()?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 1000);
    let entries = activity::list_activity(&state.db, query.asset_id, action, limit).await?;
    Ok(Json(json!({ "activity": entries })))
}

/// Undo a previously applied rename.
pub async fn rollback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    let entry = state.executor.rollback(id).await?;
    tracing::info!("rolled back rename via activity {}", id);
    Ok(Json(json!({ "activity": entry })))
}
