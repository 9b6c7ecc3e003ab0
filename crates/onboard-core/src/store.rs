//! Key-value storage behind every logical store.
//!
//! # Table layout
//!
//! One redb database file holds one table per logical store:
//! ```text
//! applications  applicant_id -> JSON ApplicationRecord
//! tombstones    applicant_id -> JSON deletion marker
//! registry      "index"      -> JSON map of every InstitutionReference
//! domain_cache  email_domain -> JSON DomainCacheEntry
//! tenants       email_domain -> JSON TenantRecord
//! ```
//!
//! Every call opens its own transaction. Nothing spans two tables, so a
//! failure in one logical store never rolls back another.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use redb::{Database, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{OnboardError, Result};

pub const APPLICATIONS_TABLE: &str = "applications";
pub const TOMBSTONES_TABLE: &str = "tombstones";
pub const REGISTRY_TABLE: &str = "registry";
pub const DOMAIN_CACHE_TABLE: &str = "domain_cache";
pub const TENANTS_TABLE: &str = "tenants";

// ---------------------------------------------------------------------------
// KvStore
// ---------------------------------------------------------------------------

pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;
    /// Returns `true` if a value was removed.
    fn delete(&self, key: &str) -> Result<bool>;
    /// All entries in key order.
    fn scan(&self) -> Result<Vec<(String, Vec<u8>)>>;
}

pub fn get_json<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

pub fn put_json<T: Serialize>(store: &dyn KvStore, key: &str, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    store.put(key, &bytes)
}

// ---------------------------------------------------------------------------
// RedbStore
// ---------------------------------------------------------------------------

/// A single redb table viewed as a [`KvStore`].
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
    table: &'static str,
}

impl RedbStore {
    /// Open or create the database file at `path`.
    pub fn open_database(path: &Path) -> Result<Arc<Database>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(OnboardError::store)?;
        Ok(Arc::new(db))
    }

    /// Bind to `table`, creating it if it doesn't already exist.
    pub fn new(db: Arc<Database>, table: &'static str) -> Result<Self> {
        let def: TableDefinition<&str, &[u8]> = TableDefinition::new(table);
        let wt = db.begin_write().map_err(OnboardError::store)?;
        wt.open_table(def).map_err(OnboardError::store)?;
        wt.commit().map_err(OnboardError::store)?;
        Ok(Self { db, table })
    }

    fn def(&self) -> TableDefinition<'static, &'static str, &'static [u8]> {
        TableDefinition::new(self.table)
    }
}

impl KvStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let rt = self.db.begin_read().map_err(OnboardError::store)?;
        let table = rt.open_table(self.def()).map_err(OnboardError::store)?;
        let value = table.get(key).map_err(OnboardError::store)?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let wt = self.db.begin_write().map_err(OnboardError::store)?;
        {
            let mut table = wt.open_table(self.def()).map_err(OnboardError::store)?;
            table.insert(key, value).map_err(OnboardError::store)?;
        }
        wt.commit().map_err(OnboardError::store)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let wt = self.db.begin_write().map_err(OnboardError::store)?;
        let removed = {
            let mut table = wt.open_table(self.def()).map_err(OnboardError::store)?;
            let removed = table.remove(key).map_err(OnboardError::store)?.is_some();
            removed
        };
        wt.commit().map_err(OnboardError::store)?;
        Ok(removed)
    }

    fn scan(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let rt = self.db.begin_read().map_err(OnboardError::store)?;
        let table = rt.open_table(self.def()).map_err(OnboardError::store)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(OnboardError::store)? {
            let (k, v) = entry.map_err(OnboardError::store)?;
            out.push((k.value().to_string(), v.value().to_vec()));
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|_| OnboardError::Store("memory store lock poisoned".to_string()))
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.remove(key).is_some())
    }

    fn scan(&self) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(self
            .lock()?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------

/// Memory store whose writes can be switched to fail.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    failing: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl FlakyStore {
    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(OnboardError::Store("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
impl KvStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.check()?;
        self.inner.put(key, value)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        self.check()?;
        self.inner.delete(key)
    }

    fn scan(&self) -> Result<Vec<(String, Vec<u8>)>> {
        self.inner.scan()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
