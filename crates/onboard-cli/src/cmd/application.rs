use crate::cmd::open_platform;
use crate::output::{or_dash, print_json, short_time};
use anyhow::Context;
use clap::{Args, Subcommand};
use onboard_core::application::{
    Address, ApplicationRecord, OrganizationData, VerificationData,
};
use onboard_core::validate;
use std::path::Path;

#[derive(Args)]
pub struct OrganizationArgs {
    /// Institution name
    #[arg(long)]
    pub name: String,
    /// Institution type (e.g. college, school, bootcamp)
    #[arg(long = "type", value_name = "TYPE")]
    pub institution_type: String,
    /// Organization size bucket
    #[arg(long)]
    pub size: String,
}

impl From<OrganizationArgs> for OrganizationData {
    fn from(a: OrganizationArgs) -> Self {
        OrganizationData {
            institution_name: a.name,
            institution_type: a.institution_type,
            organization_size: a.size,
        }
    }
}

#[derive(Subcommand)]
pub enum ApplicationSubcommand {
    /// Start a draft application
    Create {
        /// Applicant id issued by the identity provider
        id: String,
        /// Applicant email; its domain is the institution's domain
        #[arg(long)]
        email: String,
        #[command(flatten)]
        organization: OrganizationArgs,
    },
    /// Show the authoritative record
    Show { id: String },
    /// Replace step-one organization data
    Organization {
        id: String,
        #[command(flatten)]
        organization: OrganizationArgs,
    },
    /// Submit step-two verification data
    Verify {
        id: String,
        #[arg(long)]
        website: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        street: String,
        #[arg(long)]
        city: String,
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        postal_code: Option<String>,
        #[arg(long)]
        country: String,
        /// Expected number of students
        #[arg(long)]
        students: Option<u32>,
        #[arg(long)]
        tax_id: Option<String>,
    },
    /// Attach the provisioned external organization
    Bind {
        id: String,
        #[arg(long)]
        org_id: String,
        #[arg(long)]
        org_slug: String,
    },
    /// Delete a draft (approved applications cannot be deleted)
    Delete { id: String },
}

pub fn run(root: &Path, subcmd: ApplicationSubcommand, json: bool) -> anyhow::Result<()> {
    let platform = open_platform(root)?;
    let drafts = &platform.drafts;

    match subcmd {
        ApplicationSubcommand::Create {
            id,
            email,
            organization,
        } => {
            let org = OrganizationData::from(organization);
            validate::validate_applicant_id(&id)?;
            validate::validate_organization(&org)?;
            let record = drafts
                .actor(id.as_str())
                .create_draft(org, &email)
                .with_context(|| format!("failed to create application '{id}'"))?;
            report(&record, "Created", json)
        }
        ApplicationSubcommand::Show { id } => {
            let record = drafts
                .actor(id.as_str())
                .get_record()?
                .with_context(|| format!("no application for applicant '{id}'"))?;
            if json {
                return print_json(&record);
            }
            print_detail(&record);
            Ok(())
        }
        ApplicationSubcommand::Organization { id, organization } => {
            let org = OrganizationData::from(organization);
            validate::validate_organization(&org)?;
            let record = drafts.actor(id.as_str()).update_organization_data(org)?;
            report(&record, "Updated", json)
        }
        ApplicationSubcommand::Verify {
            id,
            website,
            description,
            phone,
            street,
            city,
            state,
            postal_code,
            country,
            students,
            tax_id,
        } => {
            let data = VerificationData {
                website,
                description,
                address: Address {
                    street,
                    city,
                    state_province: state,
                    postal_code,
                    country,
                },
                phone_number: phone,
                expected_student_count: students,
                tax_id,
            };
            validate::validate_verification(&data)?;
            let record = drafts.actor(id.as_str()).update_verification_data(data)?;
            report(&record, "Submitted", json)
        }
        ApplicationSubcommand::Bind {
            id,
            org_id,
            org_slug,
        } => {
            validate::validate_org_binding(&org_id, &org_slug)?;
            let record = drafts
                .actor(id.as_str())
                .add_external_org_binding(&org_id, &org_slug)?;
            report(&record, "Bound", json)
        }
        ApplicationSubcommand::Delete { id } => {
            let summary = drafts.actor(id.as_str()).delete_draft()?;
            if json {
                return print_json(&summary);
            }
            println!(
                "Deleted application '{}' ({}, was {})",
                summary.applicant_id, summary.email_domain, summary.previous_status
            );
            if summary.cache_evicted {
                println!("  evicted domain cache entry for {}", summary.email_domain);
            }
            Ok(())
        }
    }
}

/// One-line confirmation, or the full record as JSON.
pub fn report(record: &ApplicationRecord, verb: &str, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(record);
    }
    println!(
        "{verb} application '{}' [{}] step: {}",
        record.applicant_id, record.status, record.current_step
    );
    Ok(())
}

fn print_detail(r: &ApplicationRecord) {
    println!("Applicant:    {} <{}>", r.applicant_id, r.applicant_email);
    println!("Domain:       {}", r.email_domain);
    println!("Institution:  {} ({}, {})", r.institution_name, r.institution_type, r.organization_size);
    println!("Status:       {}", r.status);
    println!("Step:         {}", r.current_step);
    println!("Website:      {}", or_dash(r.website.as_deref()));
    println!("Phone:        {}", or_dash(r.phone_number.as_deref()));
    if let Some(a) = &r.address {
        println!("Address:      {}, {}, {}", a.street, a.city, a.country);
    }
    if let Some(by) = &r.reviewed_by {
        let at = r.reviewed_at.as_ref().map(short_time).unwrap_or_default();
        println!("Reviewed:     by {by} at {at}");
    }
    if let Some(reason) = &r.rejection_reason {
        println!("Reason:       {reason}");
    }
    if let (Some(id), Some(slug)) = (&r.external_org_id, &r.external_org_slug) {
        println!("Organization: {id} ({slug})");
    }
    println!("Created:      {}", short_time(&r.created_at));
    println!("Updated:      {}", short_time(&r.updated_at));
}
