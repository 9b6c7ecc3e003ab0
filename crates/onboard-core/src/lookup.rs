//! Domain ownership lookups for the login / signup path.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::{DomainCache, DomainCacheEntry};
use crate::draft::Drafts;
use crate::error::Result;
use crate::registry::{RecordSource, Registry};
use crate::types::ApplicationStatus;
use crate::validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupSource {
    Cache,
    Authoritative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainCheck {
    pub email_domain: String,
    pub source: LookupSource,
    pub found: bool,
    pub entry: Option<DomainCacheEntry>,
}

#[derive(Clone)]
pub struct DomainLookup {
    cache: DomainCache,
    registry: Arc<Registry>,
    drafts: Arc<Drafts>,
}

impl DomainLookup {
    pub fn new(cache: DomainCache, registry: Arc<Registry>, drafts: Arc<Drafts>) -> Self {
        Self {
            cache,
            registry,
            drafts,
        }
    }

    /// Hot path: one cache read. Accepts a bare domain or a full email.
    pub fn check(&self, email_or_domain: &str) -> Result<DomainCheck> {
        let email_domain = validate::normalize_domain(email_or_domain)?;
        let entry = self.cache.get(&email_domain)?;
        Ok(DomainCheck {
            found: entry.is_some(),
            email_domain,
            source: LookupSource::Cache,
            entry,
        })
    }

    /// Slow path: find a `created` application for the domain through the
    /// registry and read its authoritative record. Does not touch the cache.
    pub fn check_authoritative(&self, email_or_domain: &str) -> Result<DomainCheck> {
        let email_domain = validate::normalize_domain(email_or_domain)?;
        let candidates = self
            .registry
            .list_by_domain_and_status(&email_domain, ApplicationStatus::Created)?;

        let mut entry = None;
        for reference in candidates {
            let Some(record) = self.drafts.record(&reference.applicant_id)? else {
                tracing::debug!(
                    applicant_id = %reference.applicant_id,
                    "registry lists a created application with no record"
                );
                continue;
            };
            if let Some(found) = record.cache_entry() {
                entry = Some(found);
                break;
            }
        }

        Ok(DomainCheck {
            found: entry.is_some(),
            email_domain,
            source: LookupSource::Authoritative,
            entry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tests::{org, verification};
    use crate::config::RegistryConfig;
    use crate::registry_client::RegistryClient;
    use crate::store::MemoryStore;

    fn setup() -> (DomainLookup, Arc<Drafts>, DomainCache) {
        let registry = Arc::new(
            Registry::open(Arc::new(MemoryStore::new()), RegistryConfig::default()).unwrap(),
        );
        let cache = DomainCache::new(Arc::new(MemoryStore::new()));
        let drafts = Arc::new(Drafts::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
            RegistryClient::new(registry.clone()),
            cache.clone(),
        ));
        (
            DomainLookup::new(cache.clone(), registry, drafts.clone()),
            drafts,
            cache,
        )
    }

    fn provision(drafts: &Drafts, id: &str) {
        let actor = drafts.actor(id);
        actor.create_draft(org(), "jane@Springfield.edu").unwrap();
        actor.update_verification_data(verification()).unwrap();
        actor.approve("admin").unwrap();
        actor.add_external_org_binding("org_9", "springfield").unwrap();
    }

    #[test]
    fn miss_is_not_found() {
        let (lookup, _, _) = setup();
        let check = lookup.check("nobody@unknown.edu").unwrap();
        assert!(!check.found);
        assert_eq!(check.email_domain, "unknown.edu");
        assert_eq!(check.source, LookupSource::Cache);
    }

    #[test]
    fn hit_after_binding() {
        let (lookup, drafts, _) = setup();
        provision(&drafts, "user_1");
        let check = lookup.check("someone@SPRINGFIELD.edu").unwrap();
        assert!(check.found);
        assert_eq!(check.entry.unwrap().external_org_slug, "springfield");
        assert!(lookup.check("springfield.edu").unwrap().found);
    }

    #[test]
    fn authoritative_lookup_survives_cache_loss_without_repopulating() {
        let (lookup, drafts, cache) = setup();
        provision(&drafts, "user_1");
        cache.evict("springfield.edu").unwrap();

        assert!(!lookup.check("springfield.edu").unwrap().found);
        let check = lookup.check_authoritative("springfield.edu").unwrap();
        assert!(check.found);
        assert_eq!(check.source, LookupSource::Authoritative);
        assert!(cache.get("springfield.edu").unwrap().is_none());
    }

    #[test]
    fn authoritative_ignores_unbound_applications() {
        let (lookup, drafts, _) = setup();
        drafts
            .actor("user_1")
            .create_draft(org(), "jane@springfield.edu")
            .unwrap();
        assert!(!lookup.check_authoritative("springfield.edu").unwrap().found);
    }

    #[test]
    fn malformed_input_is_rejected() {
        let (lookup, _, _) = setup();
        assert!(lookup.check("not a domain").is_err());
    }
}
