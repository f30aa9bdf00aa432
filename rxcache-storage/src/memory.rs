//! In-memory storage backed by a map.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rxcache_core::{CacheResult, StorageError, StorageKey, StoredEnvelope};

use crate::Storage;

type Entries = HashMap<String, Option<StoredEnvelope>>;

/// Volatile [`Storage`] keeping envelopes in a `HashMap`.
///
/// Cloning shares the underlying map.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStorage {
    entries: Arc<RwLock<Entries>>,
}

impl InMemoryStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> CacheResult<RwLockReadGuard<'_, Entries>> {
        Ok(self.entries.read().map_err(|_| StorageError::LockPoisoned)?)
    }

    fn write(&self) -> CacheResult<RwLockWriteGuard<'_, Entries>> {
        Ok(self.entries.write().map_err(|_| StorageError::LockPoisoned)?)
    }
}

impl Storage for InMemoryStorage {
    fn clear(&self) -> CacheResult<()> {
        self.write()?.clear();
        Ok(())
    }

    fn clear_prefix(&self, session: Option<&str>, key_prefix: &str) -> CacheResult<()> {
        let prefix = StorageKey::namespace_prefix(session, key_prefix);
        self.write()?.retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }

    fn delete(&self, session: Option<&str>, key: &str) -> CacheResult<()> {
        let composed = StorageKey::new(session, key).compose();
        self.write()?.remove(&composed);
        Ok(())
    }

    fn put(
        &self,
        session: Option<&str>,
        key: &str,
        envelope: Option<&StoredEnvelope>,
    ) -> CacheResult<()> {
        let composed = StorageKey::new(session, key).compose();
        self.write()?.insert(composed, envelope.cloned());
        Ok(())
    }

    fn get(&self, session: Option<&str>, key: &str) -> CacheResult<Option<StoredEnvelope>> {
        let composed = StorageKey::new(session, key).compose();
        Ok(self.read()?.get(&composed).cloned().flatten())
    }

    fn exists(&self, session: Option<&str>, key: &str) -> CacheResult<bool> {
        let composed = StorageKey::new(session, key).compose();
        Ok(self.read()?.contains_key(&composed))
    }

    fn count(&self) -> CacheResult<u64> {
        Ok(self.read()?.len() as u64)
    }

    fn count_prefix(&self, session: Option<&str>, key_prefix: &str) -> CacheResult<u64> {
        let prefix = StorageKey::namespace_prefix(session, key_prefix);
        Ok(self
            .read()?
            .keys()
            .filter(|key| key.starts_with(&prefix))
            .count() as u64)
    }
}
