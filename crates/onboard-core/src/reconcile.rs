//! Operator-invoked repair of the registry against authoritative records.
//!
//! Nothing calls this automatically. The registry is brought back in line
//! with the records; the domain cache is only inspected, never written,
//! since evicting or re-adding an entry changes who can sign in.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::cache::DomainCache;
use crate::draft::Drafts;
use crate::error::{OnboardError, Result};
use crate::registry::Registry;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub dry_run: bool,
    pub records_scanned: usize,
    /// References that were missing from the registry.
    pub registered: Vec<String>,
    /// References that differed from their record.
    pub updated: Vec<String>,
    /// Registry entries with no authoritative record.
    pub orphans_removed: Vec<String>,
    /// Ids whose registry write raced with another writer and was left alone.
    #[serde(default)]
    pub skipped: Vec<String>,
    /// Cached domains with no `created` record behind them.
    pub stale_cache_domains: Vec<String>,
    /// Domains of `created` records that have no cache entry.
    pub uncached_domains: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.registered.is_empty()
            && self.updated.is_empty()
            && self.orphans_removed.is_empty()
            && self.skipped.is_empty()
            && self.stale_cache_domains.is_empty()
            && self.uncached_domains.is_empty()
    }
}

enum Repair {
    Unchanged,
    Registered,
    Updated,
    Skipped,
    Gone,
}

/// A registry write lost to a concurrent writer is skipped, not fatal.
fn skip_on_race(applicant_id: &str, err: OnboardError) -> Result<Repair> {
    match err {
        OnboardError::Conflict(_) | OnboardError::NotFound(_) => {
            tracing::warn!(applicant_id, error = %err, "reconcile skipped reference");
            Ok(Repair::Skipped)
        }
        other => Err(other),
    }
}

/// Bring the registry in line with the records.
///
/// Every record is re-read under its applicant lock before its reference is
/// compared and written, so a mutation landing mid-run is never overwritten
/// with an older snapshot. Safe to run while the server is taking traffic.
pub fn reconcile(
    drafts: &Drafts,
    registry: &Registry,
    cache: &DomainCache,
    dry_run: bool,
) -> Result<ReconcileReport> {
    let ids: Vec<String> = drafts
        .list_records()?
        .into_iter()
        .map(|r| r.applicant_id)
        .collect();
    let mut report = ReconcileReport {
        dry_run,
        records_scanned: ids.len(),
        ..Default::default()
    };

    let mut created_domains = BTreeSet::new();
    let mut known = BTreeSet::new();
    for id in &ids {
        let repair = drafts.locked(id, || {
            let Some(record) = drafts.load(id)? else {
                return Ok(Repair::Gone);
            };
            if record.cache_entry().is_some() {
                created_domains.insert(record.email_domain.clone());
            }

            let reference = record.reference();
            let (repair, written) = match registry.get(id)? {
                None if dry_run => (Repair::Registered, Ok(())),
                None => (Repair::Registered, registry.register(reference)),
                Some(existing) if existing == reference => (Repair::Unchanged, Ok(())),
                Some(_) if dry_run => (Repair::Updated, Ok(())),
                Some(_) => (Repair::Updated, registry.update(reference)),
            };
            match written {
                Ok(()) => Ok(repair),
                Err(e) => skip_on_race(id, e),
            }
        })?;

        match repair {
            Repair::Gone => continue,
            Repair::Unchanged => {}
            Repair::Registered => report.registered.push(id.clone()),
            Repair::Updated => report.updated.push(id.clone()),
            Repair::Skipped => report.skipped.push(id.clone()),
        }
        known.insert(id.clone());
    }

    for reference in registry.list_all()? {
        let id = reference.applicant_id;
        if known.contains(&id) {
            continue;
        }
        let removed = drafts.locked(&id, || {
            if drafts.load(&id)?.is_some() {
                return Ok(false);
            }
            if dry_run {
                return Ok(true);
            }
            match registry.remove(&id) {
                Ok(_) => Ok(true),
                Err(OnboardError::NotFound(_)) => Ok(false),
                Err(e) => Err(e),
            }
        })?;
        if removed {
            report.orphans_removed.push(id);
        }
    }
    report.orphans_removed.sort();

    let cached: BTreeMap<String, _> = cache
        .list()?
        .into_iter()
        .map(|e| (e.email_domain.clone(), e))
        .collect();
    report.stale_cache_domains = cached
        .keys()
        .filter(|d| !created_domains.contains(*d))
        .cloned()
        .collect();
    report.uncached_domains = created_domains
        .iter()
        .filter(|d| !cached.contains_key(*d))
        .cloned()
        .collect();

    tracing::info!(
        dry_run,
        scanned = report.records_scanned,
        registered = report.registered.len(),
        updated = report.updated.len(),
        orphans = report.orphans_removed.len(),
        skipped = report.skipped.len(),
        stale_cache = report.stale_cache_domains.len(),
        "reconcile finished"
    );
    Ok(report)
}
