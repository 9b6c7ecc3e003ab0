use axum::extract::{Path, Query, State};
use axum::Json;
use onboard_core::admin::BulkAction;
use onboard_core::registry::SearchQuery;
use onboard_core::{validate, OnboardError};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ReviewBody {
    pub reviewed_by: String,
}

#[derive(Deserialize)]
pub struct RejectBody {
    pub reviewed_by: String,
    pub reason: String,
}

#[derive(Deserialize)]
pub struct UnapproveBody {
    pub reviewed_by: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct BulkBody {
    pub ids: Vec<String>,
    pub reviewed_by: String,
    #[serde(flatten)]
    pub action: BulkAction,
}

#[derive(Deserialize)]
pub struct ReconcileParams {
    #[serde(default)]
    pub dry_run: bool,
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// POST /api/admin/applications/:id/approve
pub async fn approve(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ReviewBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let drafts = app.platform.drafts.clone();
    let result = tokio::task::spawn_blocking(move || {
        validate::validate_reviewer(&body.reviewed_by)?;
        let record = drafts.actor(id.as_str()).approve(&body.reviewed_by)?;
        Ok::<_, OnboardError>(serde_json::to_value(record)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// POST /api/admin/applications/:id/reject
pub async fn reject(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RejectBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let drafts = app.platform.drafts.clone();
    let result = tokio::task::spawn_blocking(move || {
        validate::validate_reviewer(&body.reviewed_by)?;
        validate::validate_reason(&body.reason)?;
        let record = drafts
            .actor(id.as_str())
            .reject(&body.reviewed_by, &body.reason)?;
        Ok::<_, OnboardError>(serde_json::to_value(record)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// POST /api/admin/applications/:id/unapprove — back to pending_verification.
/// The domain cache entry is left in place; evict it separately.
pub async fn unapprove(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UnapproveBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let drafts = app.platform.drafts.clone();
    let result = tokio::task::spawn_blocking(move || {
        validate::validate_reviewer(&body.reviewed_by)?;
        let record = drafts
            .actor(id.as_str())
            .unapprove(&body.reviewed_by, body.reason)?;
        Ok::<_, OnboardError>(serde_json::to_value(record)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// POST /api/admin/applications/bulk
pub async fn bulk(
    State(app): State<AppState>,
    Json(body): Json<BulkBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let platform = app.platform.clone();
    let result = tokio::task::spawn_blocking(move || {
        let result = platform.bulk_action(&body.ids, &body.action, &body.reviewed_by)?;
        Ok::<_, OnboardError>(serde_json::to_value(result)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// Registry queries
// ---------------------------------------------------------------------------

/// GET /api/admin/institutions — filtered, paged registry listing.
pub async fn list_institutions(
    State(app): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let registry = app.platform.registry.clone();
    let result = tokio::task::spawn_blocking(move || {
        let page = registry.search(&query)?;
        Ok::<_, OnboardError>(serde_json::to_value(page)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /api/admin/institutions/:id — registry entry with its full record.
pub async fn get_institution(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let platform = app.platform.clone();
    let mut enriched = tokio::task::spawn_blocking(move || {
        platform
            .registry
            .list_enriched(std::slice::from_ref(&id), platform.drafts.as_ref())
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    match enriched.pop() {
        Some(entry) => Ok(Json(serde_json::to_value(entry)?)),
        None => Err(AppError::not_found("no registry entry for this applicant")),
    }
}

/// GET /api/admin/institutions/abandoned — drafts idle past the threshold.
pub async fn list_abandoned(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let registry = app.platform.registry.clone();
    let result = tokio::task::spawn_blocking(move || {
        let refs = registry.list_abandoned_default()?;
        Ok::<_, OnboardError>(serde_json::json!({
            "abandoned_after_days": registry.config().abandoned_after_days,
            "items": refs,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /api/admin/metrics
pub async fn metrics(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let registry = app.platform.registry.clone();
    let result = tokio::task::spawn_blocking(move || {
        let metrics = registry.compute_metrics()?;
        Ok::<_, OnboardError>(serde_json::to_value(metrics)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

/// DELETE /api/admin/domains/:domain — explicit cache eviction.
pub async fn evict_domain(
    State(app): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let cache = app.platform.cache.clone();
    let result = tokio::task::spawn_blocking(move || {
        let domain = validate::normalize_domain(&domain)?;
        let evicted = cache.evict(&domain)?;
        tracing::info!(%domain, evicted, "domain cache eviction requested");
        Ok::<_, OnboardError>(serde_json::json!({ "domain": domain, "evicted": evicted }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// POST /api/admin/reconcile?dry_run=true
pub async fn reconcile(
    State(app): State<AppState>,
    Query(params): Query<ReconcileParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let platform = app.platform.clone();
    let result = tokio::task::spawn_blocking(move || {
        let report = platform.reconcile(params.dry_run)?;
        Ok::<_, OnboardError>(serde_json::to_value(report)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
