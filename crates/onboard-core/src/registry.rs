//! Global registry of institution applications.
//!
//! The registry is a denormalized projection of every applicant's record,
//! used for admin listing, search and metrics. It is never the source of
//! truth for any field.
//!
//! The whole index is one map persisted as a single value under
//! [`INDEX_KEY`], and every write goes through one lock. That serializes
//! index writes from every applicant and bounds the registry to workloads
//! whose full index fits in one stored value. Sharding by a derived key
//! (e.g. domain prefix) would lift the write ceiling, at the cost of merging
//! shards at query time.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::application::ApplicationRecord;
use crate::config::RegistryConfig;
use crate::error::{OnboardError, Result};
use crate::store::{get_json, put_json, KvStore};
use crate::types::ApplicationStatus;

pub const INDEX_KEY: &str = "index";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstitutionReference {
    pub applicant_id: String,
    pub applicant_email: String,
    pub email_domain: String,
    pub institution_name: String,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InstitutionReference {
    fn matches_text(&self, needle: &str) -> bool {
        self.institution_name.to_lowercase().contains(needle)
            || self.applicant_email.to_lowercase().contains(needle)
            || self.applicant_id.to_lowercase().contains(needle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryMetrics {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub abandoned: usize,
    /// Percentage of approved applications, two decimals (`"0.00"` when empty).
    pub approval_rate: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

/// A reference together with the full record, when it could be read.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedReference {
    pub reference: InstitutionReference,
    pub record: Option<ApplicationRecord>,
}

/// Best-effort source of full records, used to enrich registry listings.
pub trait RecordSource {
    fn record(&self, applicant_id: &str) -> Result<Option<ApplicationRecord>>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct Registry {
    store: Arc<dyn KvStore>,
    config: RegistryConfig,
    index: Mutex<BTreeMap<String, InstitutionReference>>,
}

impl Registry {
    /// Load the persisted index from `store` (empty if none was written yet).
    pub fn open(store: Arc<dyn KvStore>, config: RegistryConfig) -> Result<Self> {
        let index: BTreeMap<String, InstitutionReference> =
            get_json(store.as_ref(), INDEX_KEY)?.unwrap_or_default();
        Ok(Self {
            store,
            config,
            index: Mutex::new(index),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, InstitutionReference>>> {
        self.index
            .lock()
            .map_err(|_| OnboardError::Store("registry lock poisoned".to_string()))
    }

    /// Apply `f` to a copy of the index, persist it, then publish it.
    ///
    /// The in-memory index only changes once the store write succeeded.
    fn write<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, InstitutionReference>) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.lock()?;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        put_json(self.store.as_ref(), INDEX_KEY, &next)?;
        *guard = next;
        Ok(out)
    }

    fn snapshot(&self) -> Result<Vec<InstitutionReference>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    pub fn register(&self, reference: InstitutionReference) -> Result<()> {
        self.write(|index| {
            if index.contains_key(&reference.applicant_id) {
                return Err(OnboardError::Conflict(format!(
                    "registry reference for applicant '{}'",
                    reference.applicant_id
                )));
            }
            index.insert(reference.applicant_id.clone(), reference);
            Ok(())
        })
    }

    pub fn update(&self, reference: InstitutionReference) -> Result<()> {
        self.write(|index| {
            let slot = index.get_mut(&reference.applicant_id).ok_or_else(|| {
                OnboardError::NotFound(format!(
                    "registry reference for applicant '{}'",
                    reference.applicant_id
                ))
            })?;
            *slot = reference;
            Ok(())
        })
    }

    pub fn remove(&self, applicant_id: &str) -> Result<InstitutionReference> {
        self.write(|index| {
            index.remove(applicant_id).ok_or_else(|| {
                OnboardError::NotFound(format!(
                    "registry reference for applicant '{applicant_id}'"
                ))
            })
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn get(&self, applicant_id: &str) -> Result<Option<InstitutionReference>> {
        Ok(self.lock()?.get(applicant_id).cloned())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Every reference, newest first.
    pub fn list_all(&self) -> Result<Vec<InstitutionReference>> {
        self.filtered(|_| true)
    }

    pub fn list_by_status(&self, status: ApplicationStatus) -> Result<Vec<InstitutionReference>> {
        self.filtered(|r| r.status == status)
    }

    pub fn list_by_domain(&self, domain: &str) -> Result<Vec<InstitutionReference>> {
        let domain = domain.to_ascii_lowercase();
        self.filtered(|r| r.email_domain == domain)
    }

    pub fn list_by_domain_and_status(
        &self,
        domain: &str,
        status: ApplicationStatus,
    ) -> Result<Vec<InstitutionReference>> {
        let domain = domain.to_ascii_lowercase();
        self.filtered(|r| r.email_domain == domain && r.status == status)
    }

    /// Drafts untouched for longer than `older_than`.
    pub fn list_abandoned(&self, older_than: Duration) -> Result<Vec<InstitutionReference>> {
        let cutoff = abandoned_cutoff(older_than);
        self.filtered(|r| r.status == ApplicationStatus::Draft && r.updated_at < cutoff)
    }

    /// [`Registry::list_abandoned`] with the configured threshold.
    pub fn list_abandoned_default(&self) -> Result<Vec<InstitutionReference>> {
        self.list_abandoned(self.config.abandoned_after())
    }

    fn filtered(
        &self,
        pred: impl Fn(&InstitutionReference) -> bool,
    ) -> Result<Vec<InstitutionReference>> {
        let mut out: Vec<_> = self.snapshot()?.into_iter().filter(|r| pred(r)).collect();
        sort_newest_first(&mut out);
        Ok(out)
    }

    /// Full scan on every call; nothing is cached.
    pub fn compute_metrics(&self) -> Result<RegistryMetrics> {
        let all = self.snapshot()?;
        let cutoff = abandoned_cutoff(self.config.abandoned_after());

        let total = all.len();
        let pending = all.iter().filter(|r| r.status.is_pending()).count();
        let approved = all.iter().filter(|r| r.status.counts_as_approved()).count();
        let rejected = all
            .iter()
            .filter(|r| r.status == ApplicationStatus::Rejected)
            .count();
        let abandoned = all
            .iter()
            .filter(|r| r.status == ApplicationStatus::Draft && r.updated_at < cutoff)
            .count();

        Ok(RegistryMetrics {
            total,
            pending,
            approved,
            rejected,
            abandoned,
            approval_rate: approval_rate(approved, total),
        })
    }

    /// Filter, substring-match, then slice. Deterministic, not index-accelerated.
    pub fn search(&self, query: &SearchQuery) -> Result<Page<InstitutionReference>> {
        let mut items = match query.status {
            Some(status) => self.list_by_status(status)?,
            None => self.list_all()?,
        };

        if let Some(domain) = query.domain.as_deref().filter(|d| !d.trim().is_empty()) {
            let domain = domain.trim().to_ascii_lowercase();
            items.retain(|r| r.email_domain == domain);
        }
        if let Some(q) = query.q.as_deref().filter(|q| !q.trim().is_empty()) {
            let needle = q.trim().to_lowercase();
            items.retain(|r| r.matches_text(&needle));
        }

        let limit = query
            .limit
            .unwrap_or(self.config.default_page_size)
            .clamp(1, self.config.max_page_size.max(1));
        let total = items.len();
        let items = items.into_iter().skip(query.offset).take(limit).collect();

        Ok(Page {
            items,
            total,
            offset: query.offset,
            limit,
        })
    }

    /// Enrich the references for `applicant_ids`; unknown ids are skipped.
    pub fn list_enriched(
        &self,
        applicant_ids: &[String],
        source: &dyn RecordSource,
    ) -> Result<Vec<EnrichedReference>> {
        let index = self.lock()?;
        let references = applicant_ids
            .iter()
            .filter_map(|id| index.get(id).cloned())
            .collect();
        drop(index);
        Ok(self.enrich(references, source))
    }

    /// Attach full records to `references`. Read failures leave `record` empty.
    pub fn enrich(
        &self,
        references: Vec<InstitutionReference>,
        source: &dyn RecordSource,
    ) -> Vec<EnrichedReference> {
        references
            .into_iter()
            .map(|reference| {
                let record = match source.record(&reference.applicant_id) {
                    Ok(record) => record,
                    Err(e) => {
                        tracing::warn!(
                            applicant_id = %reference.applicant_id,
                            error = %e,
                            "could not read record to enrich registry entry"
                        );
                        None
                    }
                };
                EnrichedReference { reference, record }
            })
            .collect()
    }
}

fn sort_newest_first(refs: &mut [InstitutionReference]) {
    refs.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.applicant_id.cmp(&b.applicant_id))
    });
}

/// `approved / total * 100` rounded to two decimals.
/// `now - older_than`, saturating at the earliest representable instant.
fn abandoned_cutoff(older_than: Duration) -> DateTime<Utc> {
    Utc::now()
        .checked_sub_signed(older_than)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub fn approval_rate(approved: usize, total: usize) -> String {
    if total == 0 {
        return "0.00".to_string();
    }
    let rate = approved as f64 / total as f64 * 100.0;
    format!("{:.2}", (rate * 100.0).round() / 100.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
