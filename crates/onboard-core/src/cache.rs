//! Permanent domain cache.
//!
//! Maps an email domain to the organization that owns it. Entries never
//! expire; they are written when an application reaches `created` and
//! removed only when that application is deleted or an operator evicts them.
//! A miss means "no confirmed organization", not "unknown".

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::{get_json, put_json, KvStore};
use crate::types::ApplicationStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainCacheEntry {
    pub email_domain: String,
    pub institution_name: String,
    pub external_org_id: String,
    pub external_org_slug: String,
    pub status: ApplicationStatus,
    pub permanent: bool,
    pub cached_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct DomainCache {
    store: Arc<dyn KvStore>,
}

impl DomainCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn get(&self, domain: &str) -> Result<Option<DomainCacheEntry>> {
        get_json(self.store.as_ref(), domain)
    }

    pub fn put(&self, entry: &DomainCacheEntry) -> Result<()> {
        put_json(self.store.as_ref(), &entry.email_domain, entry)
    }

    /// Returns `true` if an entry was present.
    pub fn evict(&self, domain: &str) -> Result<bool> {
        self.store.delete(domain)
    }

    pub fn list(&self) -> Result<Vec<DomainCacheEntry>> {
        self.store
            .scan()?
            .into_iter()
            .map(|(_, bytes)| -> Result<DomainCacheEntry> { Ok(serde_json::from_slice(&bytes)?) })
            .collect()
    }
}
