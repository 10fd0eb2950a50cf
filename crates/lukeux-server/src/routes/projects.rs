use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use lukeux_core::error::LukeError;
use lukeux_core::{project, task};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/projects — the caller's projects, most recently updated first
pub async fn list_projects(
    State(app): State<AppState>,
    current: CurrentUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let projects = project::list_for_owner(&store, &current.user.id)?;
        Ok::<_, LukeError>(serde_json::json!(projects))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct CreateProjectBody {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// POST /api/projects — create a project
pub async fn create_project(
    State(app): State<AppState>,
    current: CurrentUser,
    Json(body): Json<CreateProjectBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let p = project::create(&store, &current.user.id, &body.name, body.description)?;
        Ok::<_, LukeError>(serde_json::json!(p))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /api/projects/{id} — one project with its tasks
pub async fn get_project(
    State(app): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let p = project::get_owned(&store, &current.user.id, &id)?;
        let tasks = task::list_for_owner(&store, &current.user.id, Some(&id))?;
        Ok::<_, LukeError>(serde_json::json!({ "project": p, "tasks": tasks }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct UpdateProjectBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// PUT /api/projects/{id} — rename or redescribe
pub async fn update_project(
    State(app): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateProjectBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let p = project::update(
            &store,
            &current.user.id,
            &id,
            body.name.as_deref(),
            body.description,
        )?;
        Ok::<_, LukeError>(serde_json::json!(p))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

/// DELETE /api/projects/{id} — delete; tasks and history are detached, not removed
pub async fn delete_project(
    State(app): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    tokio::task::spawn_blocking(move || project::delete(&store, &current.user.id, &id))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
