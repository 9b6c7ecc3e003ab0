//! External collaborators invoked as best-effort side effects.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::ApplicationRecord;
use crate::error::{OnboardError, Result};
use crate::store::{get_json, put_json, KvStore};

// ---------------------------------------------------------------------------
// Mailer
// ---------------------------------------------------------------------------

pub trait Mailer: Send + Sync {
    fn send_approval(&self, record: &ApplicationRecord) -> Result<()>;
}

/// Records the approval notice in the log instead of delivering it.
#[derive(Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_approval(&self, record: &ApplicationRecord) -> Result<()> {
        tracing::info!(
            applicant_id = %record.applicant_id,
            to = %record.applicant_email,
            institution = %record.institution_name,
            "approval notice"
        );
        Ok(())
    }
}

/// Keeps every sent notice in memory.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<String>>,
}

impl MemoryMailer {
    /// Recipient addresses, in send order.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Mailer for MemoryMailer {
    fn send_approval(&self, record: &ApplicationRecord) -> Result<()> {
        self.sent
            .lock()
            .map_err(|_| OnboardError::Store("mailer lock poisoned".to_string()))?
            .push(record.applicant_email.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TenantDirectory
// ---------------------------------------------------------------------------

/// The provisioned tenant, as recorded in the relational store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantRecord {
    pub name: String,
    pub external_org_id: String,
    pub email_domain: String,
    pub recorded_at: DateTime<Utc>,
}

pub trait TenantDirectory: Send + Sync {
    fn record_tenant(&self, tenant: &TenantRecord) -> Result<()>;
    fn tenant(&self, email_domain: &str) -> Result<Option<TenantRecord>>;
}

#[derive(Debug, Default)]
pub struct MemoryTenantDirectory {
    tenants: Mutex<Vec<TenantRecord>>,
}

impl TenantDirectory for MemoryTenantDirectory {
    fn record_tenant(&self, tenant: &TenantRecord) -> Result<()> {
        let mut tenants = self
            .tenants
            .lock()
            .map_err(|_| OnboardError::Store("tenant directory lock poisoned".to_string()))?;
        tenants.retain(|t| t.email_domain != tenant.email_domain);
        tenants.push(tenant.clone());
        Ok(())
    }

    fn tenant(&self, email_domain: &str) -> Result<Option<TenantRecord>> {
        let tenants = self
            .tenants
            .lock()
            .map_err(|_| OnboardError::Store("tenant directory lock poisoned".to_string()))?;
        Ok(tenants.iter().find(|t| t.email_domain == email_domain).cloned())
    }
}

/// Tenant rows kept in a [`KvStore`] table keyed by email domain.
pub struct StoreTenantDirectory {
    store: Arc<dyn KvStore>,
}

impl StoreTenantDirectory {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }
}

impl TenantDirectory for StoreTenantDirectory {
    fn record_tenant(&self, tenant: &TenantRecord) -> Result<()> {
        put_json(self.store.as_ref(), &tenant.email_domain, tenant)
    }

    fn tenant(&self, email_domain: &str) -> Result<Option<TenantRecord>> {
        get_json(self.store.as_ref(), email_domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn store_directory_keys_by_domain() {
        let dir = StoreTenantDirectory::new(Arc::new(MemoryStore::new()));
        dir.record_tenant(&TenantRecord {
            name: "Acme".into(),
            external_org_id: "org_1".into(),
            email_domain: "acme.edu".into(),
            recorded_at: Utc::now(),
        })
        .unwrap();
        assert_eq!(dir.tenant("acme.edu").unwrap().unwrap().external_org_id, "org_1");
        assert!(dir.tenant("other.edu").unwrap().is_none());
    }

    #[test]
    fn memory_directory_replaces_same_domain() {
        let dir = MemoryTenantDirectory::default();
        for org in ["org_1", "org_2"] {
            dir.record_tenant(&TenantRecord {
                name: "Acme".into(),
                external_org_id: org.into(),
                email_domain: "acme.edu".into(),
                recorded_at: Utc::now(),
            })
            .unwrap();
        }
        assert_eq!(dir.tenant("acme.edu").unwrap().unwrap().external_org_id, "org_2");
    }
}
