use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use lukeux_core::error::LukeError;
use lukeux_core::session;
use lukeux_core::user::User;

use crate::error::AppError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "lukeux_session";

/// The signed-in user behind a request, resolved from the session cookie or
/// an `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        // Already resolved by `require_admin`.
        if let Some(current) = parts.extensions.get::<CurrentUser>() {
            return Ok(current.clone());
        }
        let token = session_token(&parts.headers).ok_or_else(AppError::unauthorized)?;
        resolve(state, token)
            .await?
            .ok_or_else(AppError::unauthorized)
    }
}

/// Session token from the `lukeux_session` cookie, else a bearer token.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(cookies) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
        for part in cookies.split(';') {
            if let Some(val) = part.trim().strip_prefix("lukeux_session=") {
                if !val.is_empty() {
                    return Some(val.to_string());
                }
            }
        }
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

async fn resolve(state: &AppState, token: String) -> Result<Option<CurrentUser>, AppError> {
    let store = state.store.clone();
    let found = tokio::task::spawn_blocking(move || {
        let Some(session) = session::lookup(&store, &token)? else {
            return Ok::<_, LukeError>(None);
        };
        let user = store.get::<User>(&session.user_id)?;
        Ok(user.map(|user| CurrentUser { user, token }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(found)
}

/// Middleware for `/api/admin/*`: 401 without a live session, 403 for
/// non-admins. The resolved user is left in the request extensions.
pub async fn require_admin(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(token) = session_token(req.headers()) else {
        return json_error(401, "unauthorized");
    };
    match resolve(&state, token).await {
        Ok(Some(current)) if current.user.is_admin() => {
            req.extensions_mut().insert(current);
            next.run(req).await
        }
        Ok(Some(current)) => {
            tracing::warn!(user = %current.user.id, path = %req.uri().path(), "admin route refused");
            json_error(403, "forbidden")
        }
        Ok(None) => json_error(401, "unauthorized"),
        Err(e) => e.into_response(),
    }
}

fn json_error(status: u16, msg: &str) -> Response {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Body::from(format!(r#"{{"error":"{msg}"}}"#)))
        .expect("infallible: all header values are valid ASCII")
}

// ---------------------------------------------------------------------------
// Cookies
// ---------------------------------------------------------------------------

pub fn session_cookie(token: &str, ttl_hours: i64) -> String {
    let max_age = ttl_hours.max(0) * 3600;
    format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age}")
}

pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::test_state;
    use axum::http::{HeaderValue, StatusCode};
    use axum::{middleware, routing::get, Json, Router};
    use lukeux_core::user::{self, Role};
    use tower::ServiceExt;

    async fn whoami(current: CurrentUser) -> Json<serde_json::Value> {
        Json(serde_json::json!({ "email": current.user.email }))
    }

    fn test_app(state: AppState) -> Router {
        let admin = Router::new()
            .route("/api/admin/ping", get(whoami))
            .layer(middleware::from_fn_with_state(state.clone(), require_admin));
        Router::new()
            .route("/api/me", get(whoami))
            .merge(admin)
            .with_state(state)
    }

    fn login(state: &AppState, email: &str, role: Role) -> String {
        let u = user::register(&state.store, email, "Test", "password123", role).unwrap();
        session::create(&state.store, &u.id, 1).unwrap().token
    }

    fn request(uri: &str, cookie: Option<String>) -> Request {
        let mut req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        if let Some(c) = cookie {
            req.headers_mut()
                .insert(header::COOKIE, HeaderValue::from_str(&c).unwrap());
        }
        req
    }

    #[test]
    fn token_from_cookie_or_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("a=1; lukeux_session=tok; b=2"));
        assert_eq!(session_token(&headers).as_deref(), Some("tok"));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(session_token(&headers).as_deref(), Some("xyz"));

        assert!(session_token(&HeaderMap::new()).is_none());
    }

    #[test]
    fn cookie_strings() {
        assert_eq!(
            session_cookie("t", 2),
            "lukeux_session=t; HttpOnly; SameSite=Lax; Path=/; Max-Age=7200"
        );
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn extractor_rejects_missing_and_unknown_tokens() {
        let (_dir, state) = test_state();
        let app = test_app(state);
        let resp = app.clone().oneshot(request("/api/me", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let resp = app
            .oneshot(request("/api/me", Some("lukeux_session=nope".into())))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn extractor_accepts_live_session() {
        let (_dir, state) = test_state();
        let token = login(&state, "sam@studio.io", Role::User);
        let resp = test_app(state)
            .oneshot(request("/api/me", Some(format!("lukeux_session={token}"))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_middleware_distinguishes_401_and_403() {
        let (_dir, state) = test_state();
        let user_token = login(&state, "user@studio.io", Role::User);
        let admin_token = login(&state, "admin@studio.io", Role::Admin);
        let app = test_app(state);

        let resp = app.clone().oneshot(request("/api/admin/ping", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app
            .clone()
            .oneshot(request("/api/admin/ping", Some(format!("lukeux_session={user_token}"))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = app
            .oneshot(request("/api/admin/ping", Some(format!("lukeux_session={admin_token}"))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
