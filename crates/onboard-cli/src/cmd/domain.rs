use crate::cmd::open_platform;
use crate::output::{print_json, print_table, short_time};
use clap::Subcommand;
use onboard_core::validate;
use std::path::Path;

#[derive(Subcommand)]
pub enum DomainSubcommand {
    /// Is this domain (or email) owned by a provisioned organization?
    Check {
        domain: String,
        /// Consult authoritative records instead of the cache
        #[arg(long)]
        authoritative: bool,
    },
    /// Remove a cached domain entry
    Evict { domain: String },
    /// List every cached domain
    List,
}

pub fn run(root: &Path, subcmd: DomainSubcommand, json: bool) -> anyhow::Result<()> {
    let platform = open_platform(root)?;

    match subcmd {
        DomainSubcommand::Check {
            domain,
            authoritative,
        } => {
            let lookup = platform.lookup();
            let check = if authoritative {
                lookup.check_authoritative(&domain)?
            } else {
                lookup.check(&domain)?
            };
            if json {
                return print_json(&check);
            }
            match &check.entry {
                Some(e) => println!(
                    "{}: {} (org {} / {})",
                    check.email_domain, e.institution_name, e.external_org_id, e.external_org_slug
                ),
                None => println!("{}: no provisioned organization", check.email_domain),
            }
            Ok(())
        }
        DomainSubcommand::Evict { domain } => {
            let domain = validate::normalize_domain(&domain)?;
            let evicted = platform.cache.evict(&domain)?;
            if json {
                return print_json(&serde_json::json!({ "domain": domain, "evicted": evicted }));
            }
            if evicted {
                println!("Evicted {domain}");
            } else {
                println!("{domain} was not cached");
            }
            Ok(())
        }
        DomainSubcommand::List => {
            let entries = platform.cache.list()?;
            if json {
                return print_json(&entries);
            }
            if entries.is_empty() {
                println!("No cached domains.");
                return Ok(());
            }
            let rows = entries
                .iter()
                .map(|e| {
                    vec![
                        e.email_domain.clone(),
                        e.institution_name.clone(),
                        e.external_org_slug.clone(),
                        short_time(&e.cached_at),
                    ]
                })
                .collect();
            print_table(&["DOMAIN", "INSTITUTION", "ORG", "CACHED"], rows);
            Ok(())
        }
    }
}
