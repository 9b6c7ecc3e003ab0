//! Wiring of the stores, actors and caches for one `.onboard/` root.

use std::path::Path;
use std::sync::Arc;

use crate::admin::{self, BulkAction, BulkResult};
use crate::cache::DomainCache;
use crate::collab::{LogMailer, Mailer, MemoryTenantDirectory, StoreTenantDirectory, TenantDirectory};
use crate::config::Config;
use crate::draft::Drafts;
use crate::error::Result;
use crate::lookup::DomainLookup;
use crate::paths;
use crate::reconcile::{self, ReconcileReport};
use crate::registry::Registry;
use crate::registry_client::RegistryClient;
use crate::store::{
    KvStore, MemoryStore, RedbStore, APPLICATIONS_TABLE, DOMAIN_CACHE_TABLE, REGISTRY_TABLE,
    TENANTS_TABLE, TOMBSTONES_TABLE,
};

#[derive(Clone)]
pub struct Platform {
    pub config: Config,
    pub registry: Arc<Registry>,
    pub cache: DomainCache,
    pub drafts: Arc<Drafts>,
    pub tenants: Arc<dyn TenantDirectory>,
}

struct Stores {
    records: Arc<dyn KvStore>,
    tombstones: Arc<dyn KvStore>,
    registry: Arc<dyn KvStore>,
    cache: Arc<dyn KvStore>,
}

impl Platform {
    /// Create `.onboard/`, its config (kept if already present) and the
    /// database. Returns `true` when a new config was written.
    pub fn init(root: &Path, platform_name: &str) -> Result<bool> {
        crate::io::ensure_dir(&paths::onboard_dir(root))?;
        let created = !paths::config_path(root).exists();
        if created {
            Config::new(platform_name).save(root)?;
        }
        let db = RedbStore::open_database(&paths::db_path(root))?;
        for table in [
            APPLICATIONS_TABLE,
            TOMBSTONES_TABLE,
            REGISTRY_TABLE,
            DOMAIN_CACHE_TABLE,
            TENANTS_TABLE,
        ] {
            RedbStore::new(db.clone(), table)?;
        }
        Ok(created)
    }

    /// Open an initialized root with the default (logging) mailer.
    pub fn open(root: &Path) -> Result<Self> {
        Self::open_with_mailer(root, Arc::new(LogMailer))
    }

    pub fn open_with_mailer(root: &Path, mailer: Arc<dyn Mailer>) -> Result<Self> {
        let config = Config::load(root)?;
        for warning in config.validate() {
            tracing::warn!(level = ?warning.level, "{}", warning.message);
        }
        let db = RedbStore::open_database(&paths::db_path(root))?;
        let table = |name: &'static str| -> Result<Arc<dyn KvStore>> {
            Ok(Arc::new(RedbStore::new(db.clone(), name)?))
        };
        let stores = Stores {
            records: table(APPLICATIONS_TABLE)?,
            tombstones: table(TOMBSTONES_TABLE)?,
            registry: table(REGISTRY_TABLE)?,
            cache: table(DOMAIN_CACHE_TABLE)?,
        };
        let tenants = Arc::new(StoreTenantDirectory::new(table(TENANTS_TABLE)?));
        Self::assemble(config, stores, mailer, tenants)
    }

    /// Everything in memory; nothing survives the process.
    pub fn in_memory(config: Config) -> Result<Self> {
        let stores = Stores {
            records: Arc::new(MemoryStore::new()),
            tombstones: Arc::new(MemoryStore::new()),
            registry: Arc::new(MemoryStore::new()),
            cache: Arc::new(MemoryStore::new()),
        };
        Self::assemble(
            config,
            stores,
            Arc::new(LogMailer),
            Arc::new(MemoryTenantDirectory::default()),
        )
    }

    fn assemble(
        config: Config,
        stores: Stores,
        mailer: Arc<dyn Mailer>,
        tenants: Arc<dyn TenantDirectory>,
    ) -> Result<Self> {
        let registry = Arc::new(Registry::open(stores.registry, config.registry.clone())?);
        let cache = DomainCache::new(stores.cache);
        let drafts = Drafts::new(
            stores.records,
            stores.tombstones,
            RegistryClient::new(registry.clone()),
            cache.clone(),
        )
        .with_mailer(mailer)
        .with_tenants(tenants.clone());
        Ok(Self {
            config,
            registry,
            cache,
            drafts: Arc::new(drafts),
            tenants,
        })
    }

    pub fn lookup(&self) -> DomainLookup {
        DomainLookup::new(self.cache.clone(), self.registry.clone(), self.drafts.clone())
    }

    /// [`admin::bulk_action`] bounded by `admin.bulk_limit`.
    pub fn bulk_action(
        &self,
        ids: &[String],
        action: &BulkAction,
        reviewed_by: &str,
    ) -> Result<BulkResult> {
        admin::bulk_action(
            &self.drafts,
            ids,
            action,
            reviewed_by,
            self.config.admin.bulk_limit,
        )
    }

    pub fn reconcile(&self, dry_run: bool) -> Result<ReconcileReport> {
        reconcile::reconcile(&self.drafts, &self.registry, &self.cache, dry_run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tests::{org, verification};
    use crate::error::OnboardError;
    use crate::types::ApplicationStatus;
    use tempfile::TempDir;

    #[test]
    fn open_requires_init() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Platform::open(dir.path()),
            Err(OnboardError::NotInitialized)
        ));
    }

    #[test]
    fn init_is_idempotent() {
        let dir = TempDir::new().unwrap();
        assert!(Platform::init(dir.path(), "campus").unwrap());
        assert!(!Platform::init(dir.path(), "other").unwrap());
        assert_eq!(Config::load(dir.path()).unwrap().platform.name, "campus");
        assert!(paths::db_path(dir.path()).exists());
    }

    #[test]
    fn state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        Platform::init(dir.path(), "campus").unwrap();
        {
            let p = Platform::open(dir.path()).unwrap();
            let actor = p.drafts.actor("user_1");
            actor.create_draft(org(), "jane@springfield.edu").unwrap();
            actor.update_verification_data(verification()).unwrap();
            actor.approve("admin").unwrap();
            actor.add_external_org_binding("org_1", "springfield").unwrap();
        }

        let p = Platform::open(dir.path()).unwrap();
        let record = p.drafts.actor("user_1").get_record().unwrap().unwrap();
        assert_eq!(record.status, ApplicationStatus::Created);
        assert_eq!(
            p.registry.get("user_1").unwrap().unwrap().status,
            ApplicationStatus::Created
        );
        assert!(p.lookup().check("springfield.edu").unwrap().found);
        assert!(p.tenants.tenant("springfield.edu").unwrap().is_some());
    }

    #[test]
    fn bulk_uses_configured_limit() {
        let mut config = Config::new("campus");
        config.admin.bulk_limit = 1;
        let p = Platform::in_memory(config).unwrap();
        let ids = vec!["a".to_string(), "b".to_string()];
        assert!(matches!(
            p.bulk_action(&ids, &BulkAction::Approve, "admin"),
            Err(OnboardError::Validation(_))
        ));
    }
}
