use axum::extract::{Path, Query, State};
use axum::Json;
use onboard_core::OnboardError;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CheckParams {
    #[serde(default)]
    pub authoritative: bool,
}

/// GET /api/domains/:domain — does a provisioned organization own this domain?
///
/// Reads the permanent cache only, unless `?authoritative=true`.
pub async fn check_domain(
    State(app): State<AppState>,
    Path(domain): Path<String>,
    Query(params): Query<CheckParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let lookup = app.platform.lookup();
    let result = tokio::task::spawn_blocking(move || {
        let check = if params.authoritative {
            lookup.check_authoritative(&domain)?
        } else {
            lookup.check(&domain)?
        };
        tracing::debug!(domain = %check.email_domain, found = check.found, "domain check");
        Ok::<_, OnboardError>(serde_json::to_value(check)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
