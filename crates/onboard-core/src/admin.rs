//! Bulk admin transitions.

use serde::{Deserialize, Serialize};

use crate::draft::Drafts;
use crate::error::Result;
use crate::types::ApplicationStatus;
use crate::validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BulkAction {
    Approve,
    Reject { reason: String },
}

impl BulkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Approve => "approve",
            BulkAction::Reject { .. } => "reject",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItem {
    pub applicant_id: String,
    pub status: ApplicationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkError {
    pub applicant_id: String,
    pub kind: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkResult {
    pub batch_id: String,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<BulkItem>,
    pub errors: Vec<BulkError>,
}

/// Apply `action` to each id in order. One id failing never affects the
/// others; only malformed input (too many ids, duplicates, empty reject
/// reason) fails the whole call.
pub fn bulk_action(
    drafts: &Drafts,
    ids: &[String],
    action: &BulkAction,
    reviewed_by: &str,
    limit: usize,
) -> Result<BulkResult> {
    validate::validate_bulk_ids(ids, limit)?;
    validate::validate_reviewer(reviewed_by)?;
    if let BulkAction::Reject { reason } = action {
        validate::validate_reason(reason)?;
    }

    let batch_id = uuid::Uuid::new_v4().to_string();
    let mut results = Vec::new();
    let mut errors = Vec::new();

    for id in ids {
        let actor = drafts.actor(id.as_str());
        let outcome = match action {
            BulkAction::Approve => actor.approve(reviewed_by),
            BulkAction::Reject { reason } => actor.reject(reviewed_by, reason),
        };
        match outcome {
            Ok(record) => results.push(BulkItem {
                applicant_id: id.clone(),
                status: record.status,
            }),
            Err(e) => {
                tracing::warn!(%batch_id, applicant_id = %id, error = %e, "bulk item failed");
                errors.push(BulkError {
                    applicant_id: id.clone(),
                    kind: e.kind().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        %batch_id,
        action = action.as_str(),
        successful = results.len(),
        failed = errors.len(),
        "bulk action finished"
    );

    Ok(BulkResult {
        batch_id,
        processed: ids.len(),
        successful: results.len(),
        failed: errors.len(),
        results,
        errors,
    })
}
