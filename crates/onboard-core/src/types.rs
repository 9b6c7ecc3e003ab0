use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ApplicationStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    PendingVerification,
    Verifying,
    Approved,
    Rejected,
    Created,
}

impl ApplicationStatus {
    pub fn all() -> &'static [ApplicationStatus] {
        &[
            ApplicationStatus::Draft,
            ApplicationStatus::PendingVerification,
            ApplicationStatus::Verifying,
            ApplicationStatus::Approved,
            ApplicationStatus::Rejected,
            ApplicationStatus::Created,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::PendingVerification => "pending_verification",
            ApplicationStatus::Verifying => "verifying",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Created => "created",
        }
    }

    /// Applicants may edit their own data only while the application is open.
    pub fn allows_applicant_edits(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Draft | ApplicationStatus::PendingVerification
        )
    }

    /// Statuses an admin may approve or reject from.
    pub fn is_reviewable(self) -> bool {
        matches!(
            self,
            ApplicationStatus::PendingVerification | ApplicationStatus::Verifying
        )
    }

    /// Statuses an admin may send back to `pending_verification`.
    pub fn is_unapprovable(self) -> bool {
        matches!(self, ApplicationStatus::Approved | ApplicationStatus::Created)
    }

    /// Counted as pending review in registry metrics.
    pub fn is_pending(self) -> bool {
        self.is_reviewable()
    }

    /// Counted as approved in registry metrics; a created tenant passed approval.
    pub fn counts_as_approved(self) -> bool {
        self.is_unapprovable()
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = crate::error::OnboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ApplicationStatus::Draft),
            "pending_verification" | "pending-verification" => {
                Ok(ApplicationStatus::PendingVerification)
            }
            "verifying" => Ok(ApplicationStatus::Verifying),
            "approved" => Ok(ApplicationStatus::Approved),
            "rejected" => Ok(ApplicationStatus::Rejected),
            "created" => Ok(ApplicationStatus::Created),
            _ => Err(crate::error::OnboardError::Validation(format!(
                "unknown application status '{s}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// CurrentStep
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrentStep {
    Organization,
    Verification,
    Complete,
}

impl CurrentStep {
    pub fn as_str(self) -> &'static str {
        match self {
            CurrentStep::Organization => "organization",
            CurrentStep::Verification => "verification",
            CurrentStep::Complete => "complete",
        }
    }
}

impl fmt::Display for CurrentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_parses_from_as_str() {
        for status in ApplicationStatus::all() {
            assert_eq!(ApplicationStatus::from_str(status.as_str()).unwrap(), *status);
        }
        assert!(ApplicationStatus::from_str("archived").is_err());
    }

    #[test]
    fn applicant_edit_window() {
        assert!(ApplicationStatus::Draft.allows_applicant_edits());
        assert!(ApplicationStatus::PendingVerification.allows_applicant_edits());
        assert!(!ApplicationStatus::Verifying.allows_applicant_edits());
        assert!(!ApplicationStatus::Approved.allows_applicant_edits());
        assert!(!ApplicationStatus::Rejected.allows_applicant_edits());
        assert!(!ApplicationStatus::Created.allows_applicant_edits());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&ApplicationStatus::PendingVerification).unwrap();
        assert_eq!(json, "\"pending_verification\"");
    }

    #[test]
    fn step_ordering() {
        assert!(CurrentStep::Organization < CurrentStep::Verification);
        assert!(CurrentStep::Verification < CurrentStep::Complete);
    }
}
