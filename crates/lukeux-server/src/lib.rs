pub mod auth;
pub mod error;
pub mod figma;
pub mod routes;
pub mod state;

use axum::routing::{get, post, put};
use axum::{middleware, Router};
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the API router: public, signed-in and admin routes.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let admin = Router::new()
        .route(
            "/api/admin/templates",
            get(routes::admin::list_templates).post(routes::admin::create_template),
        )
        .route(
            "/api/admin/templates/{id}",
            get(routes::admin::get_template)
                .put(routes::admin::update_template)
                .delete(routes::admin::delete_template),
        )
        .route(
            "/api/admin/playbook",
            get(routes::admin::list_playbook).post(routes::admin::create_playbook),
        )
        .route(
            "/api/admin/playbook/{id}",
            get(routes::admin::get_playbook)
                .put(routes::admin::update_playbook)
                .delete(routes::admin::delete_playbook),
        )
        .route("/api/admin/promo-signups", get(routes::admin::list_promo))
        .route("/api/admin/promo-signups/export", get(routes::admin::export_promo))
        .route("/api/admin/promo-signups/expire", post(routes::admin::expire_promo))
        .route(
            "/api/admin/promo-signups/{id}",
            axum::routing::patch(routes::admin::update_promo).delete(routes::admin::delete_promo),
        )
        .route("/api/admin/recommendation-feedback", get(routes::admin::list_feedback))
        .route(
            "/api/admin/recommendation-feedback/export",
            get(routes::admin::export_feedback),
        )
        .route(
            "/api/admin/recommendation-feedback/{id}",
            axum::routing::delete(routes::admin::delete_feedback),
        )
        .route("/api/admin/users", get(routes::admin::list_users))
        .route("/api/admin/users/export", get(routes::admin::export_users))
        .route("/api/admin/users/{id}/role", put(routes::admin::set_role))
        .layer(middleware::from_fn_with_state(app_state.clone(), auth::require_admin));

    Router::new()
        .route("/api/health", get(routes::health::health))
        // Accounts
        .route("/api/auth/register", post(routes::accounts::register))
        .route("/api/auth/login", post(routes::accounts::login))
        .route("/api/auth/logout", post(routes::accounts::logout))
        .route("/api/auth/me", get(routes::accounts::me))
        // Projects
        .route(
            "/api/projects",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/api/projects/{id}",
            get(routes::projects::get_project)
                .put(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        // Tasks and history
        .route("/api/tasks", get(routes::tasks::list_tasks))
        .route("/api/tasks/generate", post(routes::tasks::generate))
        .route(
            "/api/tasks/{id}",
            get(routes::tasks::get_task).delete(routes::tasks::delete_task),
        )
        .route("/api/tasks/{id}/project", put(routes::tasks::move_task))
        .route("/api/tasks/{id}/feedback", post(routes::tasks::add_feedback))
        .route(
            "/api/history",
            get(routes::history::list_history).delete(routes::history::clear_history),
        )
        .route(
            "/api/history/{id}",
            axum::routing::delete(routes::history::delete_entry),
        )
        .route("/api/blueprints/parse", post(routes::blueprints::parse))
        // Templates, playbook, promo
        .route("/api/templates/public", get(routes::templates::list_public))
        .route("/api/templates/{id}/gate", post(routes::templates::gate))
        .route("/api/playbook/public", get(routes::playbook::list_public))
        .route("/api/promo/signup", post(routes::promo::signup))
        // Wireframes
        .route(
            "/api/wireframes",
            get(routes::wireframes::list_wireframes).post(routes::wireframes::create_wireframe),
        )
        .route("/api/wireframes/{id}/image", get(routes::wireframes::wireframe_image))
        // Figma
        .route(
            "/api/integrations/figma",
            axum::routing::delete(routes::figma::disconnect),
        )
        .route("/api/integrations/figma/status", get(routes::figma::status))
        .route("/api/integrations/figma/authorize", get(routes::figma::authorize))
        .route("/api/integrations/figma/callback", get(routes::figma::callback))
        .route("/api/integrations/figma/team", post(routes::figma::link_team))
        .route("/api/integrations/figma/files", get(routes::figma::list_files))
        .route("/api/integrations/figma/file", post(routes::figma::pick_file))
        .route("/api/integrations/figma/nodes", get(routes::figma::list_nodes))
        .route("/api/integrations/figma/node", post(routes::figma::pick_node))
        .route("/api/integrations/figma/export", post(routes::figma::export))
        .route("/api/integrations/figma/retry", post(routes::figma::retry))
        .route("/api/integrations/figma/start-over", post(routes::figma::start_over))
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Open the project at `root` and serve the API on `port`.
pub async fn serve(root: PathBuf, port: u16, open_browser: bool) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(root, listener, open_browser).await
}

/// Serve on a pre-bound listener, so the caller can read the actual port
/// first (useful when `port = 0` and the OS picks a free port).
pub async fn serve_on(
    root: PathBuf,
    listener: tokio::net::TcpListener,
    open_browser: bool,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app_state = tokio::task::spawn_blocking(move || AppState::open(root)).await??;
    let app = build_router(app_state);

    tracing::info!("Luke UX API listening on http://localhost:{actual_port}");

    if open_browser {
        let url = format!("http://localhost:{actual_port}/api/health");
        let _ = open::that(&url);
    }

    axum::serve(listener, app).await?;
    Ok(())
}
