use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use lukeux_core::error::LukeError;
use lukeux_core::session;
use lukeux_core::store::Store;
use lukeux_core::user::{self, PublicUser, Role};
use serde::Deserialize;

use crate::auth::{clear_session_cookie, session_cookie, CurrentUser};
use crate::error::AppError;
use crate::state::AppState;

pub(crate) fn purge_expired_sessions(store: &Store) -> lukeux_core::Result<usize> {
    let purged = session::purge_expired(store)?;
    if purged > 0 {
        tracing::info!(purged, "expired sessions removed");
    }
    Ok(purged)
}

#[derive(Deserialize)]
pub struct RegisterBody {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// POST /api/auth/register — create an account and sign it in
pub async fn register(
    State(app): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, AppError> {
    let store = app.store.clone();
    let config = app.config.clone();
    let (user, token) = tokio::task::spawn_blocking(move || {
        let role = if config.is_admin_email(&body.email) {
            Role::Admin
        } else {
            Role::User
        };
        let user = user::register(&store, &body.email, &body.name, &body.password, role)?;
        purge_expired_sessions(&store)?;
        let s = session::create(&store, &user.id, config.sessions.ttl_hours)?;
        Ok::<_, LukeError>((user, s.token))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    let cookie = session_cookie(&token, app.config.sessions.ttl_hours);
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({ "user": PublicUser::from(&user), "token": token })),
    ))
}

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/login — exchange credentials for a session
pub async fn login(
    State(app): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse, AppError> {
    let store = app.store.clone();
    let ttl = app.config.sessions.ttl_hours;
    let (user, token) = tokio::task::spawn_blocking(move || {
        let user = user::authenticate(&store, &body.email, &body.password)?;
        purge_expired_sessions(&store)?;
        let s = session::create(&store, &user.id, ttl)?;
        Ok::<_, LukeError>((user, s.token))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    tracing::info!(user = %user.id, "signed in");
    Ok((
        [(header::SET_COOKIE, session_cookie(&token, ttl))],
        Json(serde_json::json!({ "user": PublicUser::from(&user), "token": token })),
    ))
}

/// POST /api/auth/logout — revoke the current session
pub async fn logout(
    State(app): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let store = app.store.clone();
    tokio::task::spawn_blocking(move || session::revoke(&store, &current.token))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok((
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(serde_json::json!({ "ok": true })),
    ))
}

/// GET /api/auth/me — the signed-in user
pub async fn me(current: CurrentUser) -> Json<PublicUser> {
    Json(PublicUser::from(&current.user))
}
