//! `/api/admin/*`: every handler here sits behind `auth::require_admin`.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use lukeux_core::csv::{self, CsvRow};
use lukeux_core::error::LukeError;
use lukeux_core::playbook::{self, PlaybookInput};
use lukeux_core::promo::{self, PromoStatus, DEFAULT_ACTIVATION_DAYS};
use lukeux_core::recommendation;
use lukeux_core::template::{self, TemplateInput};
use lukeux_core::user::{self, PublicUser, Role};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

fn csv_response<R: CsvRow>(kind: &str, records: &[R]) -> Result<Response, AppError> {
    let filename = csv::export_filename(kind, Utc::now());
    let body = csv::to_csv(records)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// GET /api/admin/templates — all templates, public or not
pub async fn list_templates(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let list = template::list(&store)?;
        Ok::<_, LukeError>(serde_json::json!(list))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

/// POST /api/admin/templates
pub async fn create_template(
    State(app): State<AppState>,
    Json(body): Json<TemplateInput>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let t = template::create(&store, body)?;
        Ok::<_, LukeError>(serde_json::json!(t))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /api/admin/templates/{id}
pub async fn get_template(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let t = template::get(&store, &id)?;
        Ok::<_, LukeError>(serde_json::json!(t))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

/// PUT /api/admin/templates/{id}
pub async fn update_template(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TemplateInput>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let t = template::update(&store, &id, body)?;
        Ok::<_, LukeError>(serde_json::json!(t))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

/// DELETE /api/admin/templates/{id}
pub async fn delete_template(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    tokio::task::spawn_blocking(move || template::delete(&store, &id))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ---------------------------------------------------------------------------
// Playbook
// ---------------------------------------------------------------------------

/// GET /api/admin/playbook — drafts included
pub async fn list_playbook(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let list = playbook::list(&store)?;
        Ok::<_, LukeError>(serde_json::json!(list))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

/// POST /api/admin/playbook
pub async fn create_playbook(
    State(app): State<AppState>,
    Json(body): Json<PlaybookInput>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let entry = playbook::create(&store, body)?;
        Ok::<_, LukeError>(serde_json::json!(entry))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /api/admin/playbook/{id}
pub async fn get_playbook(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let entry = playbook::get(&store, &id)?;
        Ok::<_, LukeError>(serde_json::json!(entry))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

/// PUT /api/admin/playbook/{id}
pub async fn update_playbook(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PlaybookInput>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let entry = playbook::update(&store, &id, body)?;
        Ok::<_, LukeError>(serde_json::json!(entry))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

/// DELETE /api/admin/playbook/{id}
pub async fn delete_playbook(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    tokio::task::spawn_blocking(move || playbook::delete(&store, &id))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ---------------------------------------------------------------------------
// Promo signups
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct PromoQuery {
    #[serde(default)]
    pub status: Option<String>,
}

fn parse_status(raw: Option<&str>) -> Result<Option<PromoStatus>, LukeError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<PromoStatus>)
        .transpose()
}

/// GET /api/admin/promo-signups?status= — newest first
pub async fn list_promo(
    State(app): State<AppState>,
    Query(q): Query<PromoQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let status = parse_status(q.status.as_deref())?;
        let list = promo::list(&store, status)?;
        Ok::<_, LukeError>(serde_json::json!(list))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

/// GET /api/admin/promo-signups/export — CSV, same filter as the list
pub async fn export_promo(
    State(app): State<AppState>,
    Query(q): Query<PromoQuery>,
) -> Result<Response, AppError> {
    let store = app.store.clone();
    let list = tokio::task::spawn_blocking(move || {
        let status = parse_status(q.status.as_deref())?;
        promo::list(&store, status)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    csv_response("promo-signups", &list)
}

#[derive(Deserialize)]
pub struct PromoStatusBody {
    pub status: String,
    #[serde(default)]
    pub activation_days: Option<i64>,
}

/// PATCH /api/admin/promo-signups/{id} — change status
pub async fn update_promo(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PromoStatusBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let days = body.activation_days.unwrap_or(DEFAULT_ACTIVATION_DAYS);
    if days <= 0 {
        return Err(AppError::bad_request("activation_days must be positive"));
    }
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let status: PromoStatus = body.status.parse()?;
        let s = promo::set_status(&store, &id, status, days)?;
        Ok::<_, LukeError>(serde_json::json!(s))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

/// DELETE /api/admin/promo-signups/{id}
pub async fn delete_promo(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    tokio::task::spawn_blocking(move || promo::delete(&store, &id))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// POST /api/admin/promo-signups/expire — expire activations past their date
pub async fn expire_promo(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let expired = tokio::task::spawn_blocking(move || promo::expire_due(&store, Utc::now()))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(serde_json::json!({ "expired": expired })))
}

// ---------------------------------------------------------------------------
// Recommendation feedback
// ---------------------------------------------------------------------------

/// GET /api/admin/recommendation-feedback
pub async fn list_feedback(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let list = recommendation::list(&store)?;
        Ok::<_, LukeError>(serde_json::json!(list))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

/// GET /api/admin/recommendation-feedback/export
pub async fn export_feedback(State(app): State<AppState>) -> Result<Response, AppError> {
    let store = app.store.clone();
    let list = tokio::task::spawn_blocking(move || recommendation::list(&store))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    csv_response("recommendation-feedback", &list)
}

/// DELETE /api/admin/recommendation-feedback/{id}
pub async fn delete_feedback(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    tokio::task::spawn_blocking(move || recommendation::delete(&store, &id))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// GET /api/admin/users — oldest first, no password hashes
pub async fn list_users(State(app): State<AppState>) -> Result<Json<Vec<PublicUser>>, AppError> {
    let store = app.store.clone();
    let users = tokio::task::spawn_blocking(move || user::list(&store))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(users.iter().map(PublicUser::from).collect()))
}

/// GET /api/admin/users/export
pub async fn export_users(State(app): State<AppState>) -> Result<Response, AppError> {
    let store = app.store.clone();
    let users = tokio::task::spawn_blocking(move || user::list(&store))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    csv_response("users", &users)
}

#[derive(Deserialize)]
pub struct RoleBody {
    pub role: Role,
}

/// PUT /api/admin/users/{id}/role
pub async fn set_role(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RoleBody>,
) -> Result<Json<PublicUser>, AppError> {
    let store = app.store.clone();
    let u = tokio::task::spawn_blocking(move || user::set_role(&store, &id, body.role))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(PublicUser::from(&u)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_is_case_insensitive_and_optional() {
        assert_eq!(parse_status(None).unwrap(), None);
        assert_eq!(parse_status(Some(" ")).unwrap(), None);
        assert_eq!(
            parse_status(Some("activated")).unwrap(),
            Some(PromoStatus::Activated)
        );
        assert!(parse_status(Some("gone")).is_err());
    }
}
