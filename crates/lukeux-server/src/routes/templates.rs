use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    Json,
};
use lukeux_core::error::LukeError;
use lukeux_core::gating::{self, GateReport};
use lukeux_core::template::{self, TaskTemplate};
use lukeux_core::user::User;
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/templates/public — templates offered to every user
pub async fn list_public(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let templates = template::list_public(&store)?;
        Ok::<_, LukeError>(serde_json::json!(templates))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

/// A template the user may fill in. Private templates are visible to admins
/// only and reported as missing to everyone else.
pub(crate) fn visible_template(
    store: &lukeux_core::store::Store,
    user: &User,
    id: &str,
) -> lukeux_core::Result<TaskTemplate> {
    let t = template::get(store, id)?;
    if !t.is_public && !user.is_admin() {
        return Err(LukeError::TemplateNotFound(id.to_string()));
    }
    Ok(t)
}

#[derive(Deserialize)]
pub struct GateBody {
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

/// POST /api/templates/{id}/gate — per-tab validation for the form as filled so far
pub async fn gate(
    State(app): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<GateBody>,
) -> Result<Json<GateReport>, AppError> {
    let store = app.store.clone();
    let report = tokio::task::spawn_blocking(move || {
        let t = visible_template(&store, &current.user, &id)?;
        Ok::<_, LukeError>(gating::gate(&t, &body.values))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(report))
}
