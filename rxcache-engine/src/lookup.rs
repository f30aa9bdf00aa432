//! The cache branch of a request.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use rxcache_core::{CacheEnvelope, CacheResult, Cacheable, StorageKey};
use rxcache_storage::Storage;

use crate::scheduler::Scheduler;

/// A lazy, re-executable read of one storage entry.
///
/// Every [`CacheLookup::read`] performs exactly one storage `get` on the
/// configured scheduler and yields zero or one envelope. Nothing is memoized,
/// so a strategy reading again after a source failure sees the current state
/// of storage.
pub struct CacheLookup<T> {
    storage: Arc<dyn Storage>,
    key: StorageKey,
    scheduler: Scheduler,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Clone for CacheLookup<T> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            key: self.key.clone(),
            scheduler: self.scheduler.clone(),
            _payload: PhantomData,
        }
    }
}

impl<T> fmt::Debug for CacheLookup<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheLookup")
            .field("key", &self.key)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl<T: Cacheable> CacheLookup<T> {
    pub fn new(storage: Arc<dyn Storage>, key: StorageKey, scheduler: Scheduler) -> Self {
        Self {
            storage,
            key,
            scheduler,
            _payload: PhantomData,
        }
    }

    pub fn key(&self) -> &StorageKey {
        &self.key
    }

    /// Read the entry.
    ///
    /// - no entry: `Ok(None)`
    /// - entry without payload: the entry is deleted, then `Ok(None)`
    /// - entry with payload: the envelope, marked as served from cache
    ///
    /// Storage failures, including a payload that no longer deserializes
    /// into `T`, are returned as errors.
    pub async fn read(&self) -> CacheResult<Option<CacheEnvelope<T>>> {
        let storage = Arc::clone(&self.storage);
        let key = self.key.clone();

        self.scheduler
            .run(move || {
                let Some(stored) = storage.get(key.session(), key.key())? else {
                    tracing::debug!(key = %key, "Cache miss");
                    return Ok(None);
                };

                if stored.is_empty() {
                    tracing::warn!(key = %key, "Cached envelope has no payload, deleting it");
                    storage.delete(key.session(), key.key())?;
                    return Ok(None);
                }

                let envelope = stored.decode::<T>(&key.compose())?;
                if let Some(envelope) = &envelope {
                    tracing::debug!(
                        key = %key,
                        captured_at = %envelope.captured_at(),
                        "Cache hit"
                    );
                }
                Ok(envelope.map(CacheEnvelope::mark_served_from_cache))
            })
            .await
    }
}
