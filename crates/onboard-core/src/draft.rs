//! Per-applicant draft actors.
//!
//! Each applicant id owns exactly one authoritative [`ApplicationRecord`].
//! [`Drafts`] hands out a [`DraftActor`] per id; every operation on one id
//! runs under that id's lock, so two calls for the same applicant are
//! serialized while different applicants proceed in parallel.
//!
//! A mutation performs its authoritative write and its side effects
//! (registry push, domain cache write, tenant row, approval mail)
//! concurrently. Only the authoritative write decides the outcome; side
//! effects log their failures and are never rolled back. A failed
//! authoritative write can therefore leave the registry or cache ahead of
//! the record until the next mutation on that key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::{ApplicationRecord, OrganizationData, VerificationData};
use crate::cache::{DomainCache, DomainCacheEntry};
use crate::collab::{LogMailer, Mailer, TenantDirectory, TenantRecord};
use crate::error::{OnboardError, Result};
use crate::registry::{InstitutionReference, RecordSource};
use crate::registry_client::RegistryClient;
use crate::store::{get_json, put_json, KvStore};
use crate::types::ApplicationStatus;
use crate::validate;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Result of a successful `delete_draft`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteSummary {
    pub applicant_id: String,
    pub email_domain: String,
    pub previous_status: ApplicationStatus,
    /// Whether a domain cache eviction was issued.
    pub cache_evicted: bool,
}

/// Marker left behind for a deleted applicant id; deletion is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Tombstone {
    applicant_id: String,
    previous_status: ApplicationStatus,
    deleted_at: DateTime<Utc>,
}

enum SideEffect {
    Register(InstitutionReference),
    Update(InstitutionReference),
    Remove(String),
    CachePut(DomainCacheEntry),
    CacheEvict(String),
    MailApproval(Box<ApplicationRecord>),
    RecordTenant(TenantRecord),
}

impl SideEffect {
    fn label(&self) -> &'static str {
        match self {
            SideEffect::Register(_) => "registry_register",
            SideEffect::Update(_) => "registry_update",
            SideEffect::Remove(_) => "registry_remove",
            SideEffect::CachePut(_) => "cache_put",
            SideEffect::CacheEvict(_) => "cache_evict",
            SideEffect::MailApproval(_) => "approval_mail",
            SideEffect::RecordTenant(_) => "tenant_record",
        }
    }
}

// ---------------------------------------------------------------------------
// Drafts
// ---------------------------------------------------------------------------

pub struct Drafts {
    records: Arc<dyn KvStore>,
    tombstones: Arc<dyn KvStore>,
    registry: RegistryClient,
    cache: DomainCache,
    mailer: Arc<dyn Mailer>,
    tenants: Option<Arc<dyn TenantDirectory>>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Drafts {
    pub fn new(
        records: Arc<dyn KvStore>,
        tombstones: Arc<dyn KvStore>,
        registry: RegistryClient,
        cache: DomainCache,
    ) -> Self {
        Self {
            records,
            tombstones,
            registry,
            cache,
            mailer: Arc::new(LogMailer),
            tenants: None,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn with_tenants(mut self, tenants: Arc<dyn TenantDirectory>) -> Self {
        self.tenants = Some(tenants);
        self
    }

    /// Handle for the actor owning `applicant_id`.
    pub fn actor(&self, applicant_id: impl Into<String>) -> DraftActor<'_> {
        DraftActor {
            drafts: self,
            applicant_id: applicant_id.into(),
        }
    }

    /// Every authoritative record, in applicant id order.
    pub fn list_records(&self) -> Result<Vec<ApplicationRecord>> {
        self.records
            .scan()?
            .into_iter()
            .map(|(_, bytes)| -> Result<ApplicationRecord> { Ok(serde_json::from_slice(&bytes)?) })
            .collect()
    }

    fn key_lock(&self, applicant_id: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| OnboardError::Store("draft lock table poisoned".to_string()))?;
        Ok(locks
            .entry(applicant_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    /// Drop the table entry for `applicant_id` unless another caller holds
    /// or waits on it. Clones are only taken under the table lock, so the
    /// count cannot grow between the check and the removal.
    fn release_key_lock(&self, applicant_id: &str, lock: Arc<Mutex<()>>) {
        let Ok(mut locks) = self.locks.lock() else {
            return;
        };
        if Arc::strong_count(&lock) == 2 {
            locks.remove(applicant_id);
        }
    }

    /// Run `f` while holding the lock for `applicant_id`.
    pub(crate) fn locked<T>(&self, applicant_id: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self.key_lock(applicant_id)?;
        let out = match lock.lock() {
            Ok(_guard) => f(),
            Err(_) => Err(OnboardError::Store(format!(
                "lock for applicant '{applicant_id}' poisoned"
            ))),
        };
        self.release_key_lock(applicant_id, lock);
        out
    }

    #[cfg(test)]
    pub(crate) fn lock_table_len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    /// Cache entry of another applicant still `created` on `record`'s domain.
    fn successor_entry(&self, record: &ApplicationRecord) -> Result<Option<DomainCacheEntry>> {
        Ok(self
            .list_records()?
            .into_iter()
            .filter(|r| {
                r.applicant_id != record.applicant_id && r.email_domain == record.email_domain
            })
            .find_map(|r| r.cache_entry()))
    }

    pub(crate) fn load(&self, applicant_id: &str) -> Result<Option<ApplicationRecord>> {
        get_json(self.records.as_ref(), applicant_id)
    }

    fn apply_side_effect(&self, applicant_id: &str, effect: SideEffect) {
        match effect {
            SideEffect::Register(reference) => self.registry.register(reference),
            SideEffect::Update(reference) => self.registry.update(reference),
            SideEffect::Remove(id) => self.registry.remove(&id),
            SideEffect::CachePut(entry) => match self.cache.put(&entry) {
                Ok(()) => tracing::debug!(domain = %entry.email_domain, "domain cache populated"),
                Err(e) => tracing::warn!(
                    applicant_id,
                    domain = %entry.email_domain,
                    error = %e,
                    "domain cache write failed"
                ),
            },
            SideEffect::CacheEvict(domain) => {
                if let Err(e) = self.cache.evict(&domain) {
                    tracing::warn!(applicant_id, %domain, error = %e, "domain cache evict failed");
                }
            }
            SideEffect::MailApproval(record) => {
                if let Err(e) = self.mailer.send_approval(&record) {
                    tracing::warn!(applicant_id, error = %e, "approval mail failed");
                }
            }
            SideEffect::RecordTenant(tenant) => {
                let Some(tenants) = &self.tenants else {
                    return;
                };
                if let Err(e) = tenants.record_tenant(&tenant) {
                    tracing::warn!(applicant_id, error = %e, "tenant record write failed");
                }
            }
        }
    }

    /// Run `write` while the side effects run on their own threads.
    ///
    /// Side effects are joined only so their failures get logged before the
    /// caller sees the result; they never change it.
    fn commit<T>(
        &self,
        applicant_id: &str,
        write: impl FnOnce() -> Result<T>,
        effects: Vec<SideEffect>,
    ) -> Result<T> {
        std::thread::scope(|s| {
            let handles: Vec<_> = effects
                .into_iter()
                .map(|effect| {
                    let label = effect.label();
                    (label, s.spawn(move || self.apply_side_effect(applicant_id, effect)))
                })
                .collect();

            let out = write();

            for (label, handle) in handles {
                if handle.join().is_err() {
                    tracing::warn!(applicant_id, effect = label, "side effect panicked");
                }
            }
            out
        })
    }
}

impl RecordSource for Drafts {
    fn record(&self, applicant_id: &str) -> Result<Option<ApplicationRecord>> {
        self.load(applicant_id)
    }
}

// ---------------------------------------------------------------------------
// DraftActor
// ---------------------------------------------------------------------------

pub struct DraftActor<'a> {
    drafts: &'a Drafts,
    applicant_id: String,
}

impl DraftActor<'_> {
    pub fn applicant_id(&self) -> &str {
        &self.applicant_id
    }

    fn not_found(&self) -> OnboardError {
        OnboardError::NotFound(format!(
            "no application for applicant '{}'",
            self.applicant_id
        ))
    }

    fn load_existing(&self) -> Result<ApplicationRecord> {
        self.drafts
            .load(&self.applicant_id)?
            .ok_or_else(|| self.not_found())
    }

    fn save(&self, record: &ApplicationRecord, effects: Vec<SideEffect>) -> Result<()> {
        let records = self.drafts.records.as_ref();
        self.drafts.commit(
            &self.applicant_id,
            || put_json(records, &record.applicant_id, record),
            effects,
        )
    }

    /// Load, apply `f`, and persist with `effects(record)` fanned out.
    fn mutate(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut ApplicationRecord) -> Result<()>,
        effects: impl FnOnce(&ApplicationRecord) -> Vec<SideEffect>,
    ) -> Result<ApplicationRecord> {
        let record = self.drafts.locked(&self.applicant_id, || {
            let mut record = self.load_existing()?;
            f(&mut record)?;
            self.save(&record, effects(&record))?;
            Ok(record)
        })?;

        tracing::info!(
            applicant_id = %self.applicant_id,
            status = %record.status,
            op,
            "application updated"
        );
        Ok(record)
    }

    // -----------------------------------------------------------------------
    // Applicant operations
    // -----------------------------------------------------------------------

    pub fn create_draft(
        &self,
        org: OrganizationData,
        applicant_email: &str,
    ) -> Result<ApplicationRecord> {
        let email_domain = validate::email_domain(applicant_email)?;

        let record = self.drafts.locked(&self.applicant_id, || {
            if self.drafts.load(&self.applicant_id)?.is_some() {
                return Err(OnboardError::Conflict(format!(
                    "application for applicant '{}'",
                    self.applicant_id
                )));
            }
            if self.drafts.tombstones.get(&self.applicant_id)?.is_some() {
                return Err(OnboardError::Conflict(format!(
                    "application for applicant '{}' was deleted and cannot be recreated",
                    self.applicant_id
                )));
            }

            let record = ApplicationRecord::new(
                self.applicant_id.clone(),
                applicant_email.trim(),
                email_domain,
                org,
            );
            self.save(&record, vec![SideEffect::Register(record.reference())])?;
            Ok(record)
        })?;

        tracing::info!(
            applicant_id = %self.applicant_id,
            domain = %record.email_domain,
            "draft created"
        );
        Ok(record)
    }

    pub fn update_organization_data(&self, org: OrganizationData) -> Result<ApplicationRecord> {
        self.mutate(
            "update_organization",
            |r| r.apply_organization(org),
            |r| vec![SideEffect::Update(r.reference())],
        )
    }

    pub fn update_verification_data(&self, v: VerificationData) -> Result<ApplicationRecord> {
        self.mutate(
            "update_verification",
            |r| r.apply_verification(v).map(|_| ()),
            |r| vec![SideEffect::Update(r.reference())],
        )
    }

    pub fn add_external_org_binding(
        &self,
        org_id: &str,
        org_slug: &str,
    ) -> Result<ApplicationRecord> {
        self.mutate(
            "bind_external_org",
            |r| r.bind_external_org(org_id, org_slug),
            |r| {
                let mut effects = vec![SideEffect::Update(r.reference())];
                if let Some(entry) = r.cache_entry() {
                    effects.push(SideEffect::CachePut(entry));
                }
                effects.push(SideEffect::RecordTenant(TenantRecord {
                    name: r.institution_name.clone(),
                    external_org_id: org_id.to_string(),
                    email_domain: r.email_domain.clone(),
                    recorded_at: Utc::now(),
                }));
                effects
            },
        )
    }

    /// Delete the record, leaving a tombstone so the id cannot be reused.
    ///
    /// A record that was ever bound to an organization gives up its domain
    /// cache entry, unless another applicant on the same domain is still
    /// `created`, in which case the entry is rewritten to point at that one.
    ///
    /// The tombstone is written before the record is removed. If the removal
    /// fails the call errors, the registry removal has already been issued,
    /// and the tombstone sits beside a live record until the next mutation.
    pub fn delete_draft(&self) -> Result<DeleteSummary> {
        let (record, cache_evicted) = self.drafts.locked(&self.applicant_id, || {
            let record = self.load_existing()?;
            record.check_deletable()?;

            let mut effects = vec![SideEffect::Remove(self.applicant_id.clone())];
            let mut cache_evicted = false;
            if record.external_org_id.is_some() {
                match self.drafts.successor_entry(&record)? {
                    Some(entry) => {
                        tracing::info!(
                            applicant_id = %self.applicant_id,
                            domain = %entry.email_domain,
                            external_org_id = %entry.external_org_id,
                            "domain cache kept for remaining organization"
                        );
                        effects.push(SideEffect::CachePut(entry));
                    }
                    None => {
                        effects.push(SideEffect::CacheEvict(record.email_domain.clone()));
                        cache_evicted = true;
                    }
                }
            }

            let tombstone = Tombstone {
                applicant_id: self.applicant_id.clone(),
                previous_status: record.status,
                deleted_at: Utc::now(),
            };
            let records = self.drafts.records.as_ref();
            let tombstones = self.drafts.tombstones.as_ref();
            let id = self.applicant_id.as_str();
            self.drafts.commit(
                id,
                || {
                    put_json(tombstones, id, &tombstone)?;
                    records.delete(id)?;
                    Ok(())
                },
                effects,
            )?;
            Ok((record, cache_evicted))
        })?;

        tracing::info!(
            applicant_id = %self.applicant_id,
            previous_status = %record.status,
            cache_evicted,
            "draft deleted"
        );
        Ok(DeleteSummary {
            applicant_id: record.applicant_id,
            email_domain: record.email_domain,
            previous_status: record.status,
            cache_evicted,
        })
    }

    pub fn get_record(&self) -> Result<Option<ApplicationRecord>> {
        self.drafts.load(&self.applicant_id)
    }

    // -----------------------------------------------------------------------
    // Admin operations
    // -----------------------------------------------------------------------

    pub fn approve(&self, reviewed_by: &str) -> Result<ApplicationRecord> {
        self.mutate(
            "approve",
            |r| r.approve(reviewed_by),
            |r| {
                vec![
                    SideEffect::Update(r.reference()),
                    SideEffect::MailApproval(Box::new(r.clone())),
                ]
            },
        )
    }

    pub fn reject(&self, reviewed_by: &str, reason: &str) -> Result<ApplicationRecord> {
        self.mutate(
            "reject",
            |r| r.reject(reviewed_by, reason),
            |r| vec![SideEffect::Update(r.reference())],
        )
    }

    pub fn unapprove(&self, reviewed_by: &str, reason: Option<String>) -> Result<ApplicationRecord> {
        self.mutate(
            "unapprove",
            |r| r.unapprove(reviewed_by, reason),
            |r| vec![SideEffect::Update(r.reference())],
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tests::{org, verification};
    use crate::collab::{MemoryMailer, StoreTenantDirectory};
    use crate::config::RegistryConfig;
    use crate::registry::Registry;
    use crate::store::{FlakyStore, MemoryStore};
    use crate::types::CurrentStep;

    struct Fixture {
        drafts: Drafts,
        registry: Arc<Registry>,
        registry_store: Arc<FlakyStore>,
        cache: DomainCache,
        cache_store: Arc<FlakyStore>,
        records_store: Arc<FlakyStore>,
        mailer: Arc<MemoryMailer>,
        tenants: Arc<StoreTenantDirectory>,
    }

    fn fixture() -> Fixture {
        let registry_store = Arc::new(FlakyStore::default());
        let cache_store = Arc::new(FlakyStore::default());
        let records_store = Arc::new(FlakyStore::default());
        let registry =
            Arc::new(Registry::open(registry_store.clone(), RegistryConfig::default()).unwrap());
        let cache = DomainCache::new(cache_store.clone());
        let mailer = Arc::new(MemoryMailer::default());
        let tenants = Arc::new(StoreTenantDirectory::new(Arc::new(MemoryStore::new())));
        let drafts = Drafts::new(
            records_store.clone(),
            Arc::new(MemoryStore::new()),
            RegistryClient::new(registry.clone()),
            cache.clone(),
        )
        .with_mailer(mailer.clone())
        .with_tenants(tenants.clone());
        Fixture {
            drafts,
            registry,
            registry_store,
            cache,
            cache_store,
            records_store,
            mailer,
            tenants,
        }
    }

    const EMAIL: &str = "jane@springfield.edu";

    fn approved(fx: &Fixture, id: &str) {
        let actor = fx.drafts.actor(id);
        actor.create_draft(org(), EMAIL).unwrap();
        actor.update_verification_data(verification()).unwrap();
        actor.approve("admin_1").unwrap();
    }

    #[test]
    fn create_twice_conflicts_and_keeps_first() {
        let fx = fixture();
        let actor = fx.drafts.actor("user_1");
        let first = actor.create_draft(org(), EMAIL).unwrap();

        let mut other = org();
        other.institution_name = "Shelbyville Tech".into();
        let err = actor.create_draft(other, "bob@shelbyville.edu").unwrap_err();
        assert!(matches!(err, OnboardError::Conflict(_)));

        assert_eq!(actor.get_record().unwrap().unwrap(), first);
        let reference = fx.registry.get("user_1").unwrap().unwrap();
        assert_eq!(reference.institution_name, "Springfield College");
    }

    #[test]
    fn create_registers_reference() {
        let fx = fixture();
        let record = fx.drafts.actor("user_1").create_draft(org(), EMAIL).unwrap();
        assert_eq!(record.email_domain, "springfield.edu");
        assert_eq!(record.status, ApplicationStatus::Draft);
        assert_eq!(fx.registry.get("user_1").unwrap().unwrap(), record.reference());
    }

    #[test]
    fn create_rejects_malformed_email() {
        let fx = fixture();
        let err = fx.drafts.actor("user_1").create_draft(org(), "nope").unwrap_err();
        assert!(matches!(err, OnboardError::Validation(_)));
        assert!(fx.drafts.actor("user_1").get_record().unwrap().is_none());
    }

    #[test]
    fn operations_on_missing_record_are_not_found() {
        let fx = fixture();
        let actor = fx.drafts.actor("ghost");
        assert!(matches!(
            actor.update_organization_data(org()),
            Err(OnboardError::NotFound(_))
        ));
        assert!(matches!(actor.approve("admin"), Err(OnboardError::NotFound(_))));
        assert!(matches!(actor.delete_draft(), Err(OnboardError::NotFound(_))));
        assert!(actor.get_record().unwrap().is_none());
    }

    #[test]
    fn edits_refused_after_review() {
        let fx = fixture();
        approved(&fx, "user_1");
        let actor = fx.drafts.actor("user_1");
        assert!(matches!(
            actor.update_organization_data(org()),
            Err(OnboardError::Permission(_))
        ));
        assert!(matches!(
            actor.update_verification_data(verification()),
            Err(OnboardError::Permission(_))
        ));
    }

    #[test]
    fn double_approval_is_a_state_error() {
        let fx = fixture();
        approved(&fx, "user_1");
        let err = fx.drafts.actor("user_1").approve("admin_2").unwrap_err();
        assert!(matches!(err, OnboardError::State(_)));
        assert_eq!(fx.mailer.sent(), vec![EMAIL.to_string()]);
    }

    #[test]
    fn full_lifecycle_scenario() {
        let fx = fixture();
        let actor = fx.drafts.actor("user_x");

        let r = actor.create_draft(org(), EMAIL).unwrap();
        assert_eq!(r.status, ApplicationStatus::Draft);

        let r = actor.update_verification_data(verification()).unwrap();
        assert_eq!(r.status, ApplicationStatus::PendingVerification);
        assert_eq!(r.current_step, CurrentStep::Verification);

        let r = actor.approve("admin_1").unwrap();
        assert_eq!(r.status, ApplicationStatus::Approved);
        assert_eq!(r.reviewed_by.as_deref(), Some("admin_1"));
        assert!(fx.cache.get("springfield.edu").unwrap().is_none());

        let r = actor.add_external_org_binding("org_123", "acme").unwrap();
        assert_eq!(r.status, ApplicationStatus::Created);
        let entry = fx.cache.get("springfield.edu").unwrap().unwrap();
        assert_eq!(entry.external_org_id, "org_123");
        assert!(entry.permanent);
        assert_eq!(
            fx.tenants.tenant("springfield.edu").unwrap().unwrap().external_org_id,
            "org_123"
        );

        let r = actor
            .unapprove("admin_2", Some("needs re-check".into()))
            .unwrap();
        assert_eq!(r.status, ApplicationStatus::PendingVerification);
        assert_eq!(r.rejection_reason.as_deref(), Some("needs re-check"));
        // Still cached: nothing evicts on unapprove.
        assert!(fx.cache.get("springfield.edu").unwrap().is_some());
        assert_eq!(
            fx.registry.get("user_x").unwrap().unwrap().status,
            ApplicationStatus::PendingVerification
        );
    }

    #[test]
    fn delete_rules() {
        let fx = fixture();
        approved(&fx, "user_1");
        let actor = fx.drafts.actor("user_1");
        assert!(matches!(actor.delete_draft(), Err(OnboardError::State(_))));

        actor.add_external_org_binding("org_1", "springfield").unwrap();
        let summary = actor.delete_draft().unwrap();
        assert_eq!(summary.previous_status, ApplicationStatus::Created);
        assert!(summary.cache_evicted);
        assert!(fx.cache.get("springfield.edu").unwrap().is_none());
        assert!(fx.registry.get("user_1").unwrap().is_none());
        assert!(actor.get_record().unwrap().is_none());
    }

    #[test]
    fn delete_draft_without_cache_entry() {
        let fx = fixture();
        let actor = fx.drafts.actor("user_1");
        actor.create_draft(org(), EMAIL).unwrap();
        let summary = actor.delete_draft().unwrap();
        assert_eq!(summary.previous_status, ApplicationStatus::Draft);
        assert!(!summary.cache_evicted);
    }

    #[test]
    fn deletion_is_terminal_for_the_key() {
        let fx = fixture();
        let actor = fx.drafts.actor("user_1");
        actor.create_draft(org(), EMAIL).unwrap();
        actor.delete_draft().unwrap();
        let err = actor.create_draft(org(), EMAIL).unwrap_err();
        assert!(matches!(err, OnboardError::Conflict(_)));
        assert!(err.to_string().contains("cannot be recreated"));
    }

    #[test]
    fn delete_after_unapprove_still_evicts_bound_domain() {
        let fx = fixture();
        approved(&fx, "user_1");
        let actor = fx.drafts.actor("user_1");
        actor.add_external_org_binding("org_1", "springfield").unwrap();
        let r = actor.unapprove("admin_2", None).unwrap();
        assert_eq!(r.status, ApplicationStatus::PendingVerification);
        assert!(fx.cache.get("springfield.edu").unwrap().is_some());

        let summary = actor.delete_draft().unwrap();
        assert_eq!(summary.previous_status, ApplicationStatus::PendingVerification);
        assert!(summary.cache_evicted);
        assert!(fx.cache.get("springfield.edu").unwrap().is_none());
    }

    #[test]
    fn delete_keeps_domain_for_remaining_created_applicant() {
        let fx = fixture();
        approved(&fx, "user_1");
        fx.drafts
            .actor("user_1")
            .add_external_org_binding("org_1", "springfield")
            .unwrap();
        approved(&fx, "user_2");
        fx.drafts
            .actor("user_2")
            .add_external_org_binding("org_2", "springfield-2")
            .unwrap();
        assert_eq!(
            fx.cache.get("springfield.edu").unwrap().unwrap().external_org_id,
            "org_2"
        );

        let summary = fx.drafts.actor("user_2").delete_draft().unwrap();
        assert!(!summary.cache_evicted);
        let entry = fx.cache.get("springfield.edu").unwrap().unwrap();
        assert_eq!(entry.external_org_id, "org_1");

        let summary = fx.drafts.actor("user_1").delete_draft().unwrap();
        assert!(summary.cache_evicted);
        assert!(fx.cache.get("springfield.edu").unwrap().is_none());
    }

    #[test]
    fn lock_table_does_not_grow_with_addressed_ids() {
        let fx = fixture();
        for i in 0..100 {
            let err = fx.drafts.actor(format!("ghost_{i}")).approve("admin").unwrap_err();
            assert!(matches!(err, OnboardError::NotFound(_)));
        }
        assert_eq!(fx.drafts.lock_table_len(), 0);

        approved(&fx, "user_1");
        fx.drafts.actor("user_1").delete_draft().unwrap_err();
        assert_eq!(fx.drafts.lock_table_len(), 0);
    }

    #[test]
    fn registry_failure_does_not_fail_operation() {
        let fx = fixture();
        fx.registry_store.set_failing(true);
        let record = fx.drafts.actor("user_1").create_draft(org(), EMAIL).unwrap();
        assert_eq!(record.status, ApplicationStatus::Draft);
        assert!(fx.registry.get("user_1").unwrap().is_none());

        // The next mutation resends the reference.
        fx.registry_store.set_failing(false);
        fx.drafts
            .actor("user_1")
            .update_verification_data(verification())
            .unwrap();
        assert_eq!(
            fx.registry.get("user_1").unwrap().unwrap().status,
            ApplicationStatus::PendingVerification
        );
    }

    #[test]
    fn cache_failure_does_not_fail_binding() {
        let fx = fixture();
        approved(&fx, "user_1");
        fx.cache_store.set_failing(true);
        let r = fx
            .drafts
            .actor("user_1")
            .add_external_org_binding("org_1", "springfield")
            .unwrap();
        assert_eq!(r.status, ApplicationStatus::Created);
        assert!(fx.cache.get("springfield.edu").unwrap().is_none());
    }

    #[test]
    fn authoritative_failure_fails_operation() {
        let fx = fixture();
        fx.drafts.actor("user_1").create_draft(org(), EMAIL).unwrap();
        fx.records_store.set_failing(true);
        let err = fx
            .drafts
            .actor("user_1")
            .update_verification_data(verification())
            .unwrap_err();
        assert!(matches!(err, OnboardError::Store(_)));
        fx.records_store.set_failing(false);
        assert_eq!(
            fx.drafts.actor("user_1").get_record().unwrap().unwrap().status,
            ApplicationStatus::Draft
        );
    }

    #[test]
    fn same_key_operations_are_serialized() {
        let fx = fixture();
        fx.drafts.actor("user_1").create_draft(org(), EMAIL).unwrap();

        std::thread::scope(|s| {
            for i in 0..8 {
                let drafts = &fx.drafts;
                s.spawn(move || {
                    let mut o = org();
                    o.institution_name = format!("Campus {i}");
                    drafts.actor("user_1").update_organization_data(o).unwrap();
                });
            }
        });

        let record = fx.drafts.actor("user_1").get_record().unwrap().unwrap();
        assert!(record.institution_name.starts_with("Campus "));
        assert!(record.updated_at > record.created_at);
        assert_eq!(fx.drafts.lock_table_len(), 0);
    }

    #[test]
    fn different_keys_run_in_parallel_without_lost_registry_writes() {
        let fx = fixture();
        std::thread::scope(|s| {
            for i in 0..16 {
                let drafts = &fx.drafts;
                s.spawn(move || {
                    drafts
                        .actor(format!("user_{i}"))
                        .create_draft(org(), &format!("u{i}@campus{i}.edu"))
                        .unwrap();
                });
            }
        });
        assert_eq!(fx.registry.len().unwrap(), 16);
        assert_eq!(fx.drafts.list_records().unwrap().len(), 16);
    }
}
