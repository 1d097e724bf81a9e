//! Watched folder endpoints

use crate::db::{assets, folders};
use crate::error::Result;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct AddFolderRequest {
    pub path: String,
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub recursive: bool,
    #[serde(default)]
    pub auto_approve: bool,
}

fn default_true() -> bool {
    true
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Value>> {
    let folders = folders::list_folders(&state.db).await?;
    Ok(Json(json!({ "folders": folders })))
}

pub async fn add(
    State(state): State<AppState>,
    Json(request): Json<AddFolderRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let folder = state
        .watcher
        .add_folder(
            &request.path,
            request.name.as_deref(),
            request.recursive,
            request.auto_approve,
        )
        .await?;
    tracing::info!("watching folder {} ({})", folder.path, folder.id);
    Ok((StatusCode::CREATED, Json(json!({ "folder": folder }))))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    let folder = folders::get_folder(&state.db, id)
        .await?
        .ok_or_else(|| crate::error::Error::NotFound(format!("folder {}", id)))?;
    Ok(Json(json!({ "folder": folder })))
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    state.watcher.remove_folder(id).await?;
    tracing::info!("removed watched folder {}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn pause(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Value>> {
    let folder = state.watcher.pause_folder(id).await?;
    Ok(Json(json!({ "folder": folder })))
}

pub async fn resume(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Value>> {
    let folder = state.watcher.resume_folder(id).await?;
    Ok(Json(json!({ "folder": folder })))
}

pub async fn scan(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Value>> {
    let queued = state.watcher.scan_folder(id).await?;
    Ok(Json(json!({ "queued": queued })))
}

pub async fn list_assets(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    if folders::get_folder(&state.db, id).await?.is_none() {
        return Err(crate::error::Error::NotFound(format!("folder {}", id)));
    }
    let assets = assets::list_assets_for_folder(&state.db, id).await?;
    Ok(Json(json!({ "assets": assets })))
}
