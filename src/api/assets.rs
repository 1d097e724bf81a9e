//! Asset endpoints

use crate::db::assets;
use crate::error::{Error, Result};
use crate::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    let asset = assets::get_asset(&state.db, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("asset {}", id)))?;
    Ok(Json(json!({ "asset": asset })))
}
