//! Fire-and-forget adapter used by draft actors to push reference updates.
//!
//! Nothing here returns an error: failures are logged and the registry stays
//! stale until a later mutation on the same applicant resends the reference.

use std::sync::Arc;

use crate::error::OnboardError;
use crate::registry::{InstitutionReference, Registry};

#[derive(Clone)]
pub struct RegistryClient {
    registry: Arc<Registry>,
}

impl RegistryClient {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn register(&self, reference: InstitutionReference) {
        let applicant_id = reference.applicant_id.clone();
        if let Err(e) = self.registry.register(reference) {
            tracing::warn!(%applicant_id, error = %e, "registry register failed");
        }
    }

    /// Push the latest reference. A missing entry (e.g. a lost registration)
    /// is re-registered once; this is not a retry loop.
    pub fn update(&self, reference: InstitutionReference) {
        let applicant_id = reference.applicant_id.clone();
        match self.registry.update(reference.clone()) {
            Ok(()) => {}
            Err(OnboardError::NotFound(_)) => {
                tracing::debug!(%applicant_id, "registry reference missing, re-registering");
                self.register(reference);
            }
            Err(e) => tracing::warn!(%applicant_id, error = %e, "registry update failed"),
        }
    }

    pub fn remove(&self, applicant_id: &str) {
        if let Err(e) = self.registry.remove(applicant_id) {
            tracing::warn!(%applicant_id, error = %e, "registry remove failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use crate::store::{FlakyStore, MemoryStore};
    use crate::types::ApplicationStatus;
    use chrono::Utc;

    fn reference(status: ApplicationStatus) -> InstitutionReference {
        let now = Utc::now();
        InstitutionReference {
            applicant_id: "user_1".into(),
            applicant_email: "jane@acme.edu".into(),
            email_domain: "acme.edu".into(),
            institution_name: "Acme".into(),
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn update_heals_missing_reference() {
        let registry =
            Arc::new(Registry::open(Arc::new(MemoryStore::new()), RegistryConfig::default()).unwrap());
        let client = RegistryClient::new(registry.clone());

        client.update(reference(ApplicationStatus::PendingVerification));
        assert_eq!(
            registry.get("user_1").unwrap().unwrap().status,
            ApplicationStatus::PendingVerification
        );
    }

    #[test]
    fn failures_are_swallowed() {
        let store = Arc::new(FlakyStore::default());
        let registry = Arc::new(Registry::open(store.clone(), RegistryConfig::default()).unwrap());
        let client = RegistryClient::new(registry.clone());

        store.set_failing(true);
        client.register(reference(ApplicationStatus::Draft));
        client.update(reference(ApplicationStatus::Draft));
        client.remove("user_1");
        assert!(registry.get("user_1").unwrap().is_none());
    }
}
