use axum::{extract::State, http::StatusCode, Json};
use lukeux_core::error::LukeError;
use lukeux_core::promo;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SignupBody {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

/// POST /api/promo/signup — join the promo list. Invalid email is 400, a
/// repeat signup 409.
pub async fn signup(
    State(app): State<AppState>,
    Json(body): Json<SignupBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let s = promo::signup(&store, &body.email, body.name, body.code)?;
        Ok::<_, LukeError>(serde_json::json!({ "id": s.id, "status": s.status }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok((StatusCode::CREATED, Json(result)))
}
