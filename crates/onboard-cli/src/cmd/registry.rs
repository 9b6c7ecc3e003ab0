use crate::cmd::open_platform;
use crate::output::{print_json, print_table, short_time};
use anyhow::Context;
use clap::Subcommand;
use onboard_core::registry::{InstitutionReference, SearchQuery};
use onboard_core::types::ApplicationStatus;
use std::path::Path;

#[derive(Subcommand)]
pub enum RegistrySubcommand {
    /// List institutions, newest first
    List {
        /// Only this status (e.g. pending_verification)
        #[arg(long)]
        status: Option<ApplicationStatus>,
        /// Only this email domain
        #[arg(long)]
        domain: Option<String>,
        /// Case-insensitive match on name, email, or id
        #[arg(long = "search", short = 'q')]
        q: Option<String>,
        #[arg(long, default_value = "0")]
        offset: usize,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one registry entry with its full record
    Show { id: String },
    /// Drafts untouched past the abandonment threshold
    Abandoned,
}

pub fn run(root: &Path, subcmd: RegistrySubcommand, json: bool) -> anyhow::Result<()> {
    let platform = open_platform(root)?;
    let registry = &platform.registry;

    match subcmd {
        RegistrySubcommand::List {
            status,
            domain,
            q,
            offset,
            limit,
        } => {
            let page = registry.search(&SearchQuery {
                status,
                domain,
                q,
                offset,
                limit,
            })?;
            if json {
                return print_json(&page);
            }
            if page.items.is_empty() {
                println!("No institutions.");
                return Ok(());
            }
            print_references(&page.items);
            let end = page.offset + page.items.len();
            println!("\n{}-{} of {}", page.offset + 1, end, page.total);
            Ok(())
        }
        RegistrySubcommand::Show { id } => {
            let mut enriched = registry.list_enriched(std::slice::from_ref(&id), platform.drafts.as_ref())?;
            let entry = enriched
                .pop()
                .with_context(|| format!("no registry entry for applicant '{id}'"))?;
            if json {
                return print_json(&entry);
            }
            print_references(std::slice::from_ref(&entry.reference));
            if entry.record.is_none() {
                println!("\n(no authoritative record could be read)");
            }
            Ok(())
        }
        RegistrySubcommand::Abandoned => {
            let refs = registry.list_abandoned_default()?;
            if json {
                return print_json(&refs);
            }
            if refs.is_empty() {
                println!(
                    "No drafts idle for more than {} days.",
                    registry.config().abandoned_after_days
                );
                return Ok(());
            }
            print_references(&refs);
            Ok(())
        }
    }
}

pub fn metrics(root: &Path, json: bool) -> anyhow::Result<()> {
    let platform = open_platform(root)?;
    let m = platform.registry.compute_metrics()?;
    if json {
        return print_json(&m);
    }
    println!("Total:         {}", m.total);
    println!("Pending:       {}", m.pending);
    println!("Approved:      {}", m.approved);
    println!("Rejected:      {}", m.rejected);
    println!("Abandoned:     {}", m.abandoned);
    println!("Approval rate: {}%", m.approval_rate);
    Ok(())
}

fn print_references(refs: &[InstitutionReference]) {
    let rows = refs
        .iter()
        .map(|r| {
            vec![
                r.applicant_id.clone(),
                r.institution_name.clone(),
                r.email_domain.clone(),
                r.status.to_string(),
                short_time(&r.updated_at),
            ]
        })
        .collect();
    print_table(&["ID", "INSTITUTION", "DOMAIN", "STATUS", "UPDATED"], rows);
}
