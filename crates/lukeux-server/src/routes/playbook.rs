use axum::{extract::State, Json};
use lukeux_core::error::LukeError;
use lukeux_core::playbook;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/playbook/public — published entries in display order
pub async fn list_public(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let entries = playbook::list_published(&store)?;
        Ok::<_, LukeError>(serde_json::json!(entries))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}
