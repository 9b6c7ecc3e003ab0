use crate::cache::DomainCacheEntry;
use crate::error::{OnboardError, Result};
use crate::registry::InstitutionReference;
use crate::types::{ApplicationStatus, CurrentStep};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Step one of the application form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationData {
    pub institution_name: String,
    pub institution_type: String,
    pub organization_size: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_province: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    pub country: String,
}

/// Step two of the application form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationData {
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub address: Address,
    pub phone_number: String,
    #[serde(default)]
    pub expected_student_count: Option<u32>,
    #[serde(default)]
    pub tax_id: Option<String>,
}

// ---------------------------------------------------------------------------
// ApplicationRecord
// ---------------------------------------------------------------------------

/// The authoritative application for one applicant.
///
/// Transition methods are pure: they validate against the current status,
/// mutate in memory and bump `updated_at`. Persisting the result and fanning
/// out to the registry and domain cache is the draft actor's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub applicant_id: String,
    pub applicant_email: String,
    pub email_domain: String,

    pub institution_name: String,
    pub institution_type: String,
    pub organization_size: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_student_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,

    pub status: ApplicationStatus,
    pub current_step: CurrentStep,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_org_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_org_slug: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicationRecord {
    pub fn new(
        applicant_id: impl Into<String>,
        applicant_email: impl Into<String>,
        email_domain: impl Into<String>,
        org: OrganizationData,
    ) -> Self {
        let now = Utc::now();
        Self {
            applicant_id: applicant_id.into(),
            applicant_email: applicant_email.into(),
            email_domain: email_domain.into(),
            institution_name: org.institution_name.trim().to_string(),
            institution_type: org.institution_type,
            organization_size: org.organization_size,
            website: None,
            description: None,
            address: None,
            phone_number: None,
            expected_student_count: None,
            tax_id: None,
            status: ApplicationStatus::Draft,
            current_step: CurrentStep::Organization,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
            external_org_id: None,
            external_org_slug: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance `updated_at`, never letting it move backwards or stand still.
    fn touch(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::microseconds(1)
        };
        self.updated_at
    }

    fn has_organization_data(&self) -> bool {
        !self.institution_name.trim().is_empty()
            && !self.institution_type.trim().is_empty()
            && !self.organization_size.trim().is_empty()
    }

    // -----------------------------------------------------------------------
    // Applicant transitions
    // -----------------------------------------------------------------------

    pub fn apply_organization(&mut self, org: OrganizationData) -> Result<()> {
        if !self.status.allows_applicant_edits() {
            return Err(OnboardError::Permission(format!(
                "application cannot be edited in status '{}'",
                self.status
            )));
        }
        self.institution_name = org.institution_name.trim().to_string();
        self.institution_type = org.institution_type;
        self.organization_size = org.organization_size;
        self.touch();
        Ok(())
    }

    /// Store step-two data. Returns `true` when this was the first submission,
    /// i.e. the application just moved into `pending_verification`.
    pub fn apply_verification(&mut self, v: VerificationData) -> Result<bool> {
        if !self.status.allows_applicant_edits() {
            return Err(OnboardError::Permission(format!(
                "application not in correct state for verification update (status: {})",
                self.status
            )));
        }
        if !self.has_organization_data() {
            return Err(OnboardError::Prerequisite(
                "organization details must be submitted before verification".to_string(),
            ));
        }

        self.website = v.website.filter(|w| !w.trim().is_empty());
        self.description = v.description;
        self.address = Some(v.address);
        self.phone_number = Some(v.phone_number);
        self.expected_student_count = v.expected_student_count;
        self.tax_id = v.tax_id;

        let first = self.status == ApplicationStatus::Draft;
        if first {
            self.status = ApplicationStatus::PendingVerification;
            self.current_step = CurrentStep::Verification;
        }
        self.touch();
        Ok(first)
    }

    pub fn bind_external_org(
        &mut self,
        org_id: impl Into<String>,
        org_slug: impl Into<String>,
    ) -> Result<()> {
        if self.status != ApplicationStatus::Approved {
            return Err(OnboardError::State(format!(
                "application must be approved before binding an organization (status: {})",
                self.status
            )));
        }
        self.external_org_id = Some(org_id.into());
        self.external_org_slug = Some(org_slug.into());
        self.status = ApplicationStatus::Created;
        self.current_step = CurrentStep::Complete;
        self.touch();
        Ok(())
    }

    pub fn check_deletable(&self) -> Result<()> {
        if self.status == ApplicationStatus::Approved {
            return Err(OnboardError::State(
                "approved applications cannot be deleted".to_string(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Admin transitions
    // -----------------------------------------------------------------------

    pub fn approve(&mut self, reviewed_by: impl Into<String>) -> Result<()> {
        if !self.status.is_reviewable() {
            return Err(OnboardError::State(format!(
                "application not in correct state for approval (status: {})",
                self.status
            )));
        }
        let now = self.touch();
        self.status = ApplicationStatus::Approved;
        self.reviewed_by = Some(reviewed_by.into());
        self.reviewed_at = Some(now);
        self.rejection_reason = None;
        Ok(())
    }

    pub fn reject(&mut self, reviewed_by: impl Into<String>, reason: impl Into<String>) -> Result<()> {
        if !self.status.is_reviewable() {
            return Err(OnboardError::State(format!(
                "application not in correct state for rejection (status: {})",
                self.status
            )));
        }
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(OnboardError::Validation(
                "a rejection reason is required".to_string(),
            ));
        }
        let now = self.touch();
        self.status = ApplicationStatus::Rejected;
        self.reviewed_by = Some(reviewed_by.into());
        self.reviewed_at = Some(now);
        self.rejection_reason = Some(reason);
        Ok(())
    }

    /// Send an approved or created application back to review.
    ///
    /// The external binding is kept; the domain cache entry, if any, stays
    /// until an operator evicts it.
    pub fn unapprove(&mut self, reviewed_by: impl Into<String>, reason: Option<String>) -> Result<()> {
        if !self.status.is_unapprovable() {
            return Err(OnboardError::State(format!(
                "application not in correct state for unapproval (status: {})",
                self.status
            )));
        }
        let now = self.touch();
        self.status = ApplicationStatus::PendingVerification;
        self.current_step = CurrentStep::Verification;
        self.reviewed_by = Some(reviewed_by.into());
        self.reviewed_at = Some(now);
        self.rejection_reason = reason.filter(|r| !r.trim().is_empty());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Projections
    // -----------------------------------------------------------------------

    pub fn reference(&self) -> InstitutionReference {
        InstitutionReference {
            applicant_id: self.applicant_id.clone(),
            applicant_email: self.applicant_email.clone(),
            email_domain: self.email_domain.clone(),
            institution_name: self.institution_name.clone(),
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// The cache entry this record justifies, if it has reached `created`.
    pub fn cache_entry(&self) -> Option<DomainCacheEntry> {
        if self.status != ApplicationStatus::Created {
            return None;
        }
        Some(DomainCacheEntry {
            email_domain: self.email_domain.clone(),
            institution_name: self.institution_name.clone(),
            external_org_id: self.external_org_id.clone()?,
            external_org_slug: self.external_org_slug.clone()?,
            status: self.status,
            permanent: true,
            cached_at: Utc::now(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
