use axum::{
    extract::{Path, Query, State},
    Json,
};
use lukeux_core::error::LukeError;
use lukeux_core::history;
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// GET /api/history — newest first, optionally limited
pub async fn list_history(
    State(app): State<AppState>,
    current: CurrentUser,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let entries = history::list_for_owner(&store, &current.user.id, q.limit)?;
        Ok::<_, LukeError>(serde_json::json!(entries))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

/// DELETE /api/history — clear the caller's history
pub async fn clear_history(
    State(app): State<AppState>,
    current: CurrentUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let removed = tokio::task::spawn_blocking(move || history::clear(&store, &current.user.id))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(serde_json::json!({ "removed": removed })))
}

/// DELETE /api/history/{id}
pub async fn delete_entry(
    State(app): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    tokio::task::spawn_blocking(move || history::delete(&store, &current.user.id, &id))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
