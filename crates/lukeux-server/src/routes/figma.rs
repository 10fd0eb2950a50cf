use axum::{
    extract::{Query, State},
    response::Redirect,
    Json,
};
use chrono::Utc;
use lukeux_core::figma::{self as figma_store, ConnectionStatus, FigmaConnection, FigmaWizard};
use lukeux_core::store::Store;
use lukeux_core::wireframe;
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn with_store<T, F>(app: &AppState, f: F) -> Result<T, AppError>
where
    F: FnOnce(&Store) -> lukeux_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let store = app.store.clone();
    let out = tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(out)
}

/// Redirect to `base` with `pairs` appended to its query string. `base` may
/// be an absolute URL or a path within the app.
fn redirect_with(base: &str, pairs: &[(&str, &str)]) -> Redirect {
    const ORIGIN: &str = "http://app.invalid";
    let (mut url, relative) = match reqwest::Url::parse(base) {
        Ok(url) => (url, false),
        Err(_) => match reqwest::Url::parse(ORIGIN).and_then(|origin| origin.join(base)) {
            Ok(url) => (url, true),
            Err(e) => {
                tracing::warn!(base, error = %e, "figma.app_redirect is not a valid URL");
                return Redirect::to(base);
            }
        },
    };
    url.query_pairs_mut().extend_pairs(pairs);
    if !relative {
        return Redirect::to(url.as_str());
    }
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    if let Some(fragment) = url.fragment() {
        target.push('#');
        target.push_str(fragment);
    }
    Redirect::to(&target)
}

fn wizard_json(w: &FigmaWizard) -> serde_json::Value {
    serde_json::json!({ "wizard": w, "progress": w.progress() })
}

/// Move the wizard to its error step and hand back `err` for the response.
async fn record_failure(app: &AppState, user_id: &str, err: AppError) -> AppError {
    let message = err.0.to_string();
    let uid = user_id.to_string();
    let res = with_store(app, move |store| {
        figma_store::update_wizard(store, &uid, |w| w.fail(&message))
    })
    .await;
    if let Err(e) = res {
        tracing::warn!(user = %user_id, error = %e.0, "could not record figma failure");
    }
    err
}

/// A usable access token, refreshed first when it is about to expire.
async fn access_token(app: &AppState, user_id: &str) -> Result<String, AppError> {
    let uid = user_id.to_string();
    let conn = with_store(app, move |store| figma_store::require_connection(store, &uid)).await?;
    let refresh = match (&conn.refresh_token, conn.needs_refresh(Utc::now())) {
        (Some(r), true) => r.clone(),
        _ => return Ok(conn.access_token),
    };
    let grant = app.figma.refresh(&refresh).await?;
    let uid = user_id.to_string();
    let updated = with_store(app, move |store| {
        figma_store::update_tokens(
            store,
            &uid,
            grant.access_token,
            grant.refresh_token,
            grant.expires_at,
        )
    })
    .await?;
    tracing::info!(user = %user_id, "figma token refreshed");
    Ok(updated.access_token)
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// GET /api/integrations/figma/status — connection, wizard step and export progress
pub async fn status(
    State(app): State<AppState>,
    current: CurrentUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let uid = current.user.id.clone();
    let (conn, wizard) = with_store(&app, move |store| {
        let conn = figma_store::get_connection(store, &uid)?;
        let wizard = figma_store::load_wizard(store, &uid)?;
        Ok((conn, wizard))
    })
    .await?;
    let mut json = wizard_json(&wizard);
    json["connection"] = serde_json::json!(ConnectionStatus::from(conn.as_ref()));
    Ok(Json(json))
}

/// GET /api/integrations/figma/authorize — consent URL bound to a fresh state token
pub async fn authorize(
    State(app): State<AppState>,
    current: CurrentUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let uid = current.user.id.clone();
    let state = with_store(&app, move |store| figma_store::begin_oauth(store, &uid)).await?;
    let url = app.figma.authorize_url(&state.state)?;
    Ok(Json(serde_json::json!({ "url": url })))
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// GET /api/integrations/figma/callback — OAuth redirect target
///
/// Always answers with a redirect back into the app: `?figma=connected` on
/// success, `?figma=error&reason=…` otherwise.
pub async fn callback(State(app): State<AppState>, Query(q): Query<CallbackQuery>) -> Redirect {
    let base = app.config.figma.app_redirect.clone();
    let fail = |reason: &str| redirect_with(&base, &[("figma", "error"), ("reason", reason)]);

    if let Some(err) = q.error.as_deref() {
        tracing::warn!(error = err, "figma consent refused");
        return fail("denied");
    }
    let (Some(code), Some(state)) = (q.code, q.state) else {
        return fail("missing_code");
    };

    let user_id = match with_store(&app, move |store| figma_store::consume_oauth_state(store, &state)).await {
        Ok(uid) => uid,
        Err(e) => {
            tracing::warn!(error = %e.0, "figma callback with bad state");
            return fail("state");
        }
    };

    let grant = match app.figma.exchange_code(&code).await {
        Ok(g) => g,
        Err(e) => {
            tracing::warn!(user = %user_id, error = %e, "figma code exchange failed");
            return fail("exchange");
        }
    };

    let conn = FigmaConnection {
        user_id: user_id.clone(),
        access_token: grant.access_token,
        refresh_token: grant.refresh_token,
        expires_at: grant.expires_at,
        figma_user_id: grant.figma_user_id,
        team_id: None,
        created_at: Utc::now(),
    };
    match with_store(&app, move |store| figma_store::save_connection(store, &conn)).await {
        Ok(_) => redirect_with(&base, &[("figma", "connected")]),
        Err(e) => {
            tracing::warn!(user = %user_id, error = %e.0, "storing figma connection failed");
            fail("store")
        }
    }
}

/// DELETE /api/integrations/figma — forget the grant and reset the wizard
pub async fn disconnect(
    State(app): State<AppState>,
    current: CurrentUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let uid = current.user.id.clone();
    let removed = with_store(&app, move |store| figma_store::disconnect(store, &uid)).await?;
    Ok(Json(serde_json::json!({ "disconnected": removed })))
}

// ---------------------------------------------------------------------------
// Wizard steps
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct TeamBody {
    pub team_id: String,
}

/// POST /api/integrations/figma/team — link a team; answers with its projects
pub async fn link_team(
    State(app): State<AppState>,
    current: CurrentUser,
    Json(body): Json<TeamBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let uid = current.user.id.clone();
    let team_id = body.team_id.trim().to_string();
    {
        let uid = uid.clone();
        let team_id = team_id.clone();
        with_store(&app, move |store| {
            figma_store::require_connection(store, &uid)?;
            figma_store::check_transition(store, &uid, |w| w.link_team(&team_id))
        })
        .await?;
    }
    let token = access_token(&app, &uid).await?;
    let projects = match app.figma.team_projects(&token, &team_id).await {
        Ok(p) => p,
        Err(e) => return Err(record_failure(&app, &uid, e.into()).await),
    };

    let wizard = with_store(&app, move |store| {
        let (wizard, ()) = figma_store::update_wizard(store, &uid, |w| w.link_team(&team_id))?;
        if let Some(mut conn) = figma_store::get_connection(store, &uid)? {
            conn.team_id = Some(team_id);
            store.put(&conn)?;
        }
        Ok(wizard)
    })
    .await?;

    let mut json = wizard_json(&wizard);
    json["projects"] = serde_json::json!(projects);
    Ok(Json(json))
}

#[derive(Deserialize)]
pub struct FilesQuery {
    pub project_id: String,
}

/// GET /api/integrations/figma/files?project_id= — files in one team project
pub async fn list_files(
    State(app): State<AppState>,
    current: CurrentUser,
    Query(q): Query<FilesQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let token = access_token(&app, &current.user.id).await?;
    let files = app.figma.project_files(&token, &q.project_id).await?;
    Ok(Json(serde_json::json!(files)))
}

#[derive(Deserialize)]
pub struct FileBody {
    pub file_key: String,
}

/// POST /api/integrations/figma/file — choose a file; answers with its pages and frames
pub async fn pick_file(
    State(app): State<AppState>,
    current: CurrentUser,
    Json(body): Json<FileBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let uid = current.user.id.clone();
    let file_key = body.file_key.trim().to_string();
    {
        let uid = uid.clone();
        let file_key = file_key.clone();
        with_store(&app, move |store| {
            figma_store::require_connection(store, &uid)?;
            figma_store::check_transition(store, &uid, |w| w.pick_file(&file_key))
        })
        .await?;
    }
    let token = access_token(&app, &uid).await?;
    let nodes = match app.figma.file_nodes(&token, &file_key).await {
        Ok(n) => n,
        Err(e) => return Err(record_failure(&app, &uid, e.into()).await),
    };
    let (wizard, ()) = with_store(&app, move |store| {
        figma_store::update_wizard(store, &uid, |w| w.pick_file(&file_key))
    })
    .await?;
    let mut json = wizard_json(&wizard);
    json["nodes"] = serde_json::json!(nodes);
    Ok(Json(json))
}

#[derive(Deserialize)]
pub struct NodesQuery {
    #[serde(default)]
    pub file_key: Option<String>,
}

/// GET /api/integrations/figma/nodes — pages and frames of the given or chosen file
pub async fn list_nodes(
    State(app): State<AppState>,
    current: CurrentUser,
    Query(q): Query<NodesQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let uid = current.user.id.clone();
    let file_key = match q.file_key.filter(|k| !k.trim().is_empty()) {
        Some(k) => k,
        None => with_store(&app, move |store| figma_store::load_wizard(store, &uid))
            .await?
            .file_key
            .ok_or_else(|| AppError::bad_request("no file chosen"))?,
    };
    let token = access_token(&app, &current.user.id).await?;
    let nodes = app.figma.file_nodes(&token, &file_key).await?;
    Ok(Json(serde_json::json!(nodes)))
}

#[derive(Deserialize)]
pub struct NodeBody {
    pub node_id: String,
}

/// POST /api/integrations/figma/node — choose the node the export is pinned to
pub async fn pick_node(
    State(app): State<AppState>,
    current: CurrentUser,
    Json(body): Json<NodeBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let uid = current.user.id.clone();
    let (wizard, ()) = with_store(&app, move |store| {
        figma_store::update_wizard(store, &uid, |w| w.pick_node(&body.node_id))
    })
    .await?;
    Ok(Json(wizard_json(&wizard)))
}

#[derive(Deserialize)]
pub struct ExportBody {
    pub wireframe_id: String,
}

/// POST /api/integrations/figma/export — pin a wireframe to the chosen node
///
/// The strip walks Upload → Applying → Verified: the image is already hosted
/// at its public URL, the comment is posted, and the returned comment id
/// verifies the export.
pub async fn export(
    State(app): State<AppState>,
    current: CurrentUser,
    Json(body): Json<ExportBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let uid = current.user.id.clone();
    let wid = body.wireframe_id.trim().to_string();

    let (title, wizard) = {
        let uid = uid.clone();
        let wid = wid.clone();
        with_store(&app, move |store| {
            let w = wireframe::get_owned(store, &uid, &wid)?;
            let (wizard, ()) = figma_store::update_wizard(store, &uid, |wz| wz.begin_export(&wid))?;
            Ok((w.title, wizard))
        })
        .await?
    };
    let Some(progress) = wizard.export.clone() else {
        return Err(AppError(anyhow::anyhow!("export started without progress")));
    };
    tracing::info!(user = %uid, wireframe = %wid, file = %progress.file_key, "figma export started");

    let token = match access_token(&app, &uid).await {
        Ok(t) => t,
        Err(e) => return Err(record_failure(&app, &uid, e).await),
    };

    {
        let uid = uid.clone();
        with_store(&app, move |store| {
            figma_store::update_wizard(store, &uid, |w| w.export_applying())
        })
        .await?;
    }

    let message = format!("Luke UX wireframe: {title}\n{}", app.wireframe_url(&wid));
    let comment_id = match app
        .figma
        .post_comment(&token, &progress.file_key, &progress.node_id, &message)
        .await
    {
        Ok(id) => id,
        Err(e) => return Err(record_failure(&app, &uid, e.into()).await),
    };

    let (wizard, ()) = {
        let uid = uid.clone();
        let comment_id = comment_id.clone();
        with_store(&app, move |store| {
            figma_store::update_wizard(store, &uid, |w| w.finish(&comment_id))
        })
        .await?
    };
    tracing::info!(user = %uid, comment = %comment_id, "figma export verified");
    let mut json = wizard_json(&wizard);
    json["comment_id"] = serde_json::json!(comment_id);
    Ok(Json(json))
}

/// POST /api/integrations/figma/retry — "Try Again" after an error
pub async fn retry(
    State(app): State<AppState>,
    current: CurrentUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let uid = current.user.id.clone();
    let (wizard, ()) =
        with_store(&app, move |store| figma_store::update_wizard(store, &uid, |w| w.retry())).await?;
    Ok(Json(wizard_json(&wizard)))
}

/// POST /api/integrations/figma/start-over — begin another export
pub async fn start_over(
    State(app): State<AppState>,
    current: CurrentUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let uid = current.user.id.clone();
    let (wizard, ()) = with_store(&app, move |store| {
        figma_store::update_wizard(store, &uid, |w| w.start_over())
    })
    .await?;
    Ok(Json(wizard_json(&wizard)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::LOCATION;
    use axum::response::IntoResponse;

    fn location(r: Redirect) -> String {
        r.into_response().headers()[LOCATION].to_str().unwrap().to_string()
    }

    #[test]
    fn redirect_appends_to_app_path() {
        assert_eq!(
            location(redirect_with("/integrations/figma", &[("figma", "connected")])),
            "/integrations/figma?figma=connected"
        );
    }

    #[test]
    fn redirect_keeps_existing_query_and_fragment() {
        assert_eq!(
            location(redirect_with(
                "https://app.luke.test/settings?tab=figma#top",
                &[("figma", "error"), ("reason", "state")]
            )),
            "https://app.luke.test/settings?tab=figma&figma=error&reason=state#top"
        );
        assert_eq!(
            location(redirect_with("/settings?tab=figma", &[("figma", "connected")])),
            "/settings?tab=figma&figma=connected"
        );
    }
}
