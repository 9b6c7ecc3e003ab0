use axum::extract::{Path, State};
use axum::Json;
use onboard_core::application::{OrganizationData, VerificationData};
use onboard_core::{validate, OnboardError};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateApplicationBody {
    pub applicant_id: String,
    pub applicant_email: String,
    #[serde(flatten)]
    pub organization: OrganizationData,
}

#[derive(Deserialize)]
pub struct BindingBody {
    pub org_id: String,
    pub org_slug: String,
}

/// POST /api/applications — start a draft for a new applicant.
pub async fn create_application(
    State(app): State<AppState>,
    Json(body): Json<CreateApplicationBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let drafts = app.platform.drafts.clone();
    let result = tokio::task::spawn_blocking(move || {
        validate::validate_applicant_id(&body.applicant_id)?;
        validate::validate_organization(&body.organization)?;
        let record = drafts
            .actor(body.applicant_id.as_str())
            .create_draft(body.organization, &body.applicant_email)?;
        Ok::<_, OnboardError>(serde_json::to_value(record)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /api/applications/:id — the authoritative record.
pub async fn get_application(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let drafts = app.platform.drafts.clone();
    let record = tokio::task::spawn_blocking(move || drafts.actor(id.as_str()).get_record())
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    match record {
        Some(record) => Ok(Json(serde_json::to_value(record)?)),
        None => Err(AppError::not_found("no application for this applicant")),
    }
}

/// PUT /api/applications/:id/organization — replace step-1 data.
pub async fn update_organization(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<OrganizationData>,
) -> Result<Json<serde_json::Value>, AppError> {
    let drafts = app.platform.drafts.clone();
    let result = tokio::task::spawn_blocking(move || {
        validate::validate_organization(&body)?;
        let record = drafts.actor(id.as_str()).update_organization_data(body)?;
        Ok::<_, OnboardError>(serde_json::to_value(record)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// PUT /api/applications/:id/verification — submit or replace step-2 data.
pub async fn update_verification(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<VerificationData>,
) -> Result<Json<serde_json::Value>, AppError> {
    let drafts = app.platform.drafts.clone();
    let result = tokio::task::spawn_blocking(move || {
        validate::validate_verification(&body)?;
        let record = drafts.actor(id.as_str()).update_verification_data(body)?;
        Ok::<_, OnboardError>(serde_json::to_value(record)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// POST /api/applications/:id/binding — attach the provisioned organization.
pub async fn bind_organization(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<BindingBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let drafts = app.platform.drafts.clone();
    let result = tokio::task::spawn_blocking(move || {
        validate::validate_org_binding(&body.org_id, &body.org_slug)?;
        let record = drafts
            .actor(id.as_str())
            .add_external_org_binding(&body.org_id, &body.org_slug)?;
        Ok::<_, OnboardError>(serde_json::to_value(record)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// DELETE /api/applications/:id — delete a draft; approved ones are refused.
pub async fn delete_application(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let drafts = app.platform.drafts.clone();
    let result = tokio::task::spawn_blocking(move || {
        let summary = drafts.actor(id.as_str()).delete_draft()?;
        Ok::<_, OnboardError>(serde_json::to_value(summary)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
