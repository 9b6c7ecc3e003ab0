use crate::cmd::application::report;
use crate::cmd::open_platform;
use crate::output::{print_json, print_table};
use clap::{Subcommand, ValueEnum};
use onboard_core::admin::BulkAction;
use onboard_core::validate;
use std::path::Path;

#[derive(Clone, Copy, ValueEnum)]
pub enum BulkKind {
    Approve,
    Reject,
}

#[derive(Subcommand)]
pub enum AdminSubcommand {
    /// Approve an application awaiting review
    Approve {
        id: String,
        /// Reviewer id
        #[arg(long = "by")]
        reviewed_by: String,
    },
    /// Reject an application awaiting review
    Reject {
        id: String,
        #[arg(long = "by")]
        reviewed_by: String,
        #[arg(long)]
        reason: String,
    },
    /// Send an approved or created application back to review.
    /// Does not evict the domain cache; use `onboard domain evict`.
    Unapprove {
        id: String,
        #[arg(long = "by")]
        reviewed_by: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Approve or reject several applications, one at a time
    Bulk {
        #[arg(long, value_enum)]
        action: BulkKind,
        #[arg(long = "by")]
        reviewed_by: String,
        /// Required for reject
        #[arg(long)]
        reason: Option<String>,
        /// Applicant ids
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

pub fn run(root: &Path, subcmd: AdminSubcommand, json: bool) -> anyhow::Result<()> {
    let platform = open_platform(root)?;

    match subcmd {
        AdminSubcommand::Approve { id, reviewed_by } => {
            validate::validate_reviewer(&reviewed_by)?;
            let record = platform.drafts.actor(id.as_str()).approve(&reviewed_by)?;
            report(&record, "Approved", json)
        }
        AdminSubcommand::Reject {
            id,
            reviewed_by,
            reason,
        } => {
            validate::validate_reviewer(&reviewed_by)?;
            validate::validate_reason(&reason)?;
            let record = platform
                .drafts
                .actor(id.as_str())
                .reject(&reviewed_by, &reason)?;
            report(&record, "Rejected", json)
        }
        AdminSubcommand::Unapprove {
            id,
            reviewed_by,
            reason,
        } => {
            validate::validate_reviewer(&reviewed_by)?;
            let record = platform
                .drafts
                .actor(id.as_str())
                .unapprove(&reviewed_by, reason)?;
            report(&record, "Unapproved", json)
        }
        AdminSubcommand::Bulk {
            action,
            reviewed_by,
            reason,
            ids,
        } => {
            let action = match action {
                BulkKind::Approve => BulkAction::Approve,
                BulkKind::Reject => BulkAction::Reject {
                    reason: reason.unwrap_or_default(),
                },
            };
            let result = platform.bulk_action(&ids, &action, &reviewed_by)?;
            if json {
                return print_json(&result);
            }

            println!(
                "Bulk {}: {} processed, {} succeeded, {} failed",
                action.as_str(),
                result.processed,
                result.successful,
                result.failed
            );
            if !result.errors.is_empty() {
                let rows = result
                    .errors
                    .iter()
                    .map(|e| vec![e.applicant_id.clone(), e.kind.clone(), e.error.clone()])
                    .collect();
                print_table(&["ID", "KIND", "ERROR"], rows);
            }
            Ok(())
        }
    }
}
