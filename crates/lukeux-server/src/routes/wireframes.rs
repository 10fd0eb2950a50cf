use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use lukeux_core::error::LukeError;
use lukeux_core::wireframe::{self, NewWireframe};

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/wireframes — the caller's wireframes, without image data
pub async fn list_wireframes(
    State(app): State<AppState>,
    current: CurrentUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let list = wireframe::list_for_owner(&store, &current.user.id)?;
        Ok::<_, LukeError>(list)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    let list: Vec<serde_json::Value> = result
        .iter()
        .map(|w| {
            let mut v = serde_json::json!(w);
            v["image_url"] = serde_json::json!(app.wireframe_url(&w.id));
            v
        })
        .collect();
    Ok(Json(serde_json::json!(list)))
}

/// POST /api/wireframes — store an image for export
pub async fn create_wireframe(
    State(app): State<AppState>,
    current: CurrentUser,
    Json(body): Json<NewWireframe>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let store = app.store.clone();
    let limits = app.config.attachments.clone();
    let w = tokio::task::spawn_blocking(move || {
        wireframe::create(&store, &current.user.id, body, &limits)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    let mut json = serde_json::json!(w.without_data());
    json["image_url"] = serde_json::json!(app.wireframe_url(&w.id));
    Ok((StatusCode::CREATED, Json(json)))
}

/// GET /api/wireframes/{id}/image — raw image bytes. Public: the id is an
/// unguessable UUID and Figma fetches it without credentials.
pub async fn wireframe_image(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let store = app.store.clone();
    let (mime, bytes) = tokio::task::spawn_blocking(move || {
        let w = wireframe::get(&store, &id)?;
        let bytes = w.bytes()?;
        Ok::<_, LukeError>((w.mime_type, bytes))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok((
        [
            (header::CONTENT_TYPE, mime),
            (
                header::CACHE_CONTROL,
                "public, max-age=31536000, immutable".to_string(),
            ),
        ],
        bytes,
    ))
}
