use axum::{extract::State, Json};

use crate::state::AppState;

/// GET /api/health — liveness plus which provider is wired up
pub async fn health(State(app): State<AppState>) -> Json<serde_json::Value> {
    let (provider, model) = match &app.llm {
        Some(p) => (Some(p.name().to_string()), Some(p.model().to_string())),
        None => (None, None),
    };
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "provider": provider,
        "model": model,
    }))
}
