//! Rename suggestion endpoints

use crate::db::suggestions::{self, SuggestionStatus};
use crate::error::{Error, Result};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

const DEFAULT_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub asset_id: Option<Uuid>,
    pub folder_id: Option<Uuid>,
    pub min_confidence: Option<f64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AmendRequest {
    pub suggested_filename: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchResolveRequest {
    pub ids: Vec<Uuid>,
    pub action: BatchAction,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchAction {
    Approve,
    Reject,
}

#[derive(Debug, Deserialize)]
pub struct BatchExecuteRequest {
    pub ids: Vec<Uuid>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>> {
    let status = query
        .status
        .as_deref()
        .map(SuggestionStatus::parse)
        .transpose()?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 1000);
    let filter = suggestions::SuggestionFilter {
        status,
        asset_id: query.asset_id,
        folder_id: query.folder_id,
        min_confidence: query.min_confidence,
    };
    let suggestions = suggestions::list_suggestions(&state.db, &filter, limit).await?;
    Ok(Json(json!({ "suggestions": suggestions })))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<Value>> {
    let stats = suggestions::suggestion_stats(&state.db).await?;
    Ok(Json(json!({ "stats": stats })))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    let suggestion = suggestions::get_suggestion(&state.db, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("suggestion {}", id)))?;
    Ok(Json(json!({ "suggestion": suggestion })))
}

pub async fn approve(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Value>> {
    let suggestion =
        suggestions::resolve_pending(&state.db, id, SuggestionStatus::Approved).await?;
    Ok(Json(json!({ "suggestion": suggestion })))
}

pub async fn reject(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Value>> {
    let suggestion =
        suggestions::resolve_pending(&state.db, id, SuggestionStatus::Rejected).await?;
    Ok(Json(json!({ "suggestion": suggestion })))
}

/// Amend the suggested filename while the suggestion is still pending.
pub async fn amend(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AmendRequest>,
) -> Result<Json<Value>> {
    let name = request.suggested_filename.trim();
    if name.is_empty() {
        return Err(Error::Validation("suggested_filename is empty".to_string()));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(Error::Validation(
            "suggested_filename must be a bare filename".to_string(),
        ));
    }
    let suggestion = suggestions::update_suggested_filename(&state.db, id, name).await?;
    Ok(Json(json!({ "suggestion": suggestion })))
}

pub async fn execute(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Value>> {
    let suggestion = state.executor.execute(id).await?;
    Ok(Json(json!({ "suggestion": suggestion })))
}

pub async fn batch_resolve(
    State(state): State<AppState>,
    Json(request): Json<BatchResolveRequest>,
) -> Result<Json<Value>> {
    let target = match request.action {
        BatchAction::Approve => SuggestionStatus::Approved,
        BatchAction::Reject => SuggestionStatus::Rejected,
    };
    let mut resolved = Vec::with_capacity(request.ids.len());
    let mut errors = Vec::new();
    for id in request.ids {
        match suggestions::resolve_pending(&state.db, id, target).await {
            Ok(s) => resolved.push(s),
            Err(e) => errors.push(json!({ "id": id, "error": e.to_string() })),
        }
    }
    Ok(Json(json!({ "resolved": resolved, "errors": errors })))
}

pub async fn batch_execute(
    State(state): State<AppState>,
    Json(request): Json<BatchExecuteRequest>,
) -> Result<Json<Value>> {
    let results = state.executor.execute_batch(&request.ids).await;
    Ok(Json(json!({ "results": results })))
}
