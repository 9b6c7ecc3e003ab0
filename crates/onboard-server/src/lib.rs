pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post, put};
use axum::Router;
use onboard_core::Platform;
use std::path::Path;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(platform: Platform) -> Router {
    let app_state = state::AppState::new(platform);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Applicant surface
        .route(
            "/api/applications",
            post(routes::applications::create_application),
        )
        .route(
            "/api/applications/{id}",
            get(routes::applications::get_application)
                .delete(routes::applications::delete_application),
        )
        .route(
            "/api/applications/{id}/organization",
            put(routes::applications::update_organization),
        )
        .route(
            "/api/applications/{id}/verification",
            put(routes::applications::update_verification),
        )
        .route(
            "/api/applications/{id}/binding",
            post(routes::applications::bind_organization),
        )
        // Admin actions
        .route(
            "/api/admin/applications/bulk",
            post(routes::admin::bulk),
        )
        .route(
            "/api/admin/applications/{id}/approve",
            post(routes::admin::approve),
        )
        .route(
            "/api/admin/applications/{id}/reject",
            post(routes::admin::reject),
        )
        .route(
            "/api/admin/applications/{id}/unapprove",
            post(routes::admin::unapprove),
        )
        // Registry
        .route(
            "/api/admin/institutions",
            get(routes::admin::list_institutions),
        )
        .route(
            "/api/admin/institutions/abandoned",
            get(routes::admin::list_abandoned),
        )
        .route(
            "/api/admin/institutions/{id}",
            get(routes::admin::get_institution),
        )
        .route("/api/admin/metrics", get(routes::admin::metrics))
        // Maintenance
        .route(
            "/api/admin/domains/{domain}",
            axum::routing::delete(routes::admin::evict_domain),
        )
        .route("/api/admin/reconcile", post(routes::admin::reconcile))
        // Public lookup
        .route("/api/domains/{domain}", get(routes::domains::check_domain))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Open the platform at `root` and serve the API on `port`.
pub async fn serve(root: &Path, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    serve_on(root, listener).await
}

/// Serve on a pre-bound listener, so callers can bind port 0 and read the
/// chosen port first.
pub async fn serve_on(root: &Path, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let platform = Platform::open(root)?;
    let actual_port = listener.local_addr()?.port();
    let app = build_router(platform);

    tracing::info!("onboarding API listening on http://localhost:{actual_port}");

    axum::serve(listener, app).await?;
    Ok(())
}
