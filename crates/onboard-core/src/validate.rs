//! Input validation that runs before any actor is touched.
//!
//! Everything here returns [`OnboardError::Validation`]; the actors assume
//! their inputs already passed through these checks.

use crate::application::{OrganizationData, VerificationData};
use crate::error::{OnboardError, Result};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

pub const MAX_APPLICANT_ID_LEN: usize = 128;
pub const DEFAULT_BULK_LIMIT: usize = 50;

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
static SLUG_RE: OnceLock<Regex> = OnceLock::new();
static URL_RE: OnceLock<Regex> = OnceLock::new();

fn email_re() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@([a-zA-Z0-9](?:[a-zA-Z0-9\-]*[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9\-]*[a-zA-Z0-9])?)+)$")
            .unwrap()
    })
}

fn slug_re() -> &'static Regex {
    SLUG_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

fn url_re() -> &'static Regex {
    URL_RE.get_or_init(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*\.[^\s]+$").unwrap())
}

fn invalid(msg: impl Into<String>) -> OnboardError {
    OnboardError::Validation(msg.into())
}

/// Lowercased domain part of `email`.
pub fn email_domain(email: &str) -> Result<String> {
    let email = email.trim();
    let caps = email_re()
        .captures(email)
        .ok_or_else(|| invalid(format!("'{email}' is not a valid email address")))?;
    Ok(caps[1].to_ascii_lowercase())
}

/// Lowercased domain of a bare domain (`@` prefix allowed) or a full email.
pub fn normalize_domain(input: &str) -> Result<String> {
    let input = input.trim();
    let domain = input.rsplit('@').next().unwrap_or(input);
    email_domain(&format!("probe@{domain}"))
}

pub fn validate_applicant_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > MAX_APPLICANT_ID_LEN || id.chars().any(char::is_whitespace) {
        return Err(invalid(format!(
            "applicant id must be 1..={MAX_APPLICANT_ID_LEN} characters without whitespace"
        )));
    }
    Ok(())
}

pub fn validate_organization(org: &OrganizationData) -> Result<()> {
    let name_len = org.institution_name.trim().chars().count();
    if !(2..=200).contains(&name_len) {
        return Err(invalid("institution name must be between 2 and 200 characters"));
    }
    if org.institution_type.trim().is_empty() {
        return Err(invalid("institution type is required"));
    }
    if org.organization_size.trim().is_empty() {
        return Err(invalid("organization size is required"));
    }
    Ok(())
}

pub fn validate_verification(v: &VerificationData) -> Result<()> {
    if let Some(website) = v.website.as_deref().filter(|w| !w.trim().is_empty()) {
        if !url_re().is_match(website.trim()) {
            return Err(invalid(format!("website '{website}' must be an http(s) URL")));
        }
    }

    let digits = v.phone_number.chars().filter(char::is_ascii_digit).count();
    if !(7..=20).contains(&digits) {
        return Err(invalid("phone number must contain 7 to 20 digits"));
    }

    let address = &v.address;
    for (label, value) in [
        ("street address", &address.street),
        ("city", &address.city),
        ("country", &address.country),
    ] {
        if value.trim().is_empty() {
            return Err(invalid(format!("{label} is required for verification")));
        }
    }

    if v.expected_student_count == Some(0) {
        return Err(invalid("expected student count must be greater than zero"));
    }
    Ok(())
}

/// Reasons must carry text; whitespace alone is not a reason.
pub fn validate_reason(reason: &str) -> Result<()> {
    if reason.trim().is_empty() {
        return Err(invalid("a rejection reason is required"));
    }
    Ok(())
}

pub fn validate_reviewer(reviewed_by: &str) -> Result<()> {
    if reviewed_by.trim().is_empty() {
        return Err(invalid("reviewer id is required"));
    }
    Ok(())
}

pub fn validate_org_binding(org_id: &str, org_slug: &str) -> Result<()> {
    if org_id.trim().is_empty() {
        return Err(invalid("external organization id is required"));
    }
    if org_slug.len() > 64 || !slug_re().is_match(org_slug) {
        return Err(invalid(format!(
            "invalid organization slug '{org_slug}': must be lowercase alphanumeric with hyphens"
        )));
    }
    Ok(())
}

pub fn validate_bulk_ids(ids: &[String], limit: usize) -> Result<()> {
    if ids.is_empty() {
        return Err(invalid("bulk action requires at least one application id"));
    }
    if ids.len() > limit {
        return Err(invalid(format!(
            "bulk action accepts at most {limit} ids, got {}",
            ids.len()
        )));
    }
    let mut seen = HashSet::new();
    for id in ids {
        validate_applicant_id(id)?;
        if !seen.insert(id.as_str()) {
            return Err(invalid(format!("duplicate id '{id}' in bulk action")));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
