//! RxCache Storage - Session-Scoped Key-Value Contract
//!
//! The resolution engine only consumes the [`Storage`] trait defined here.
//! Two backends ship with the crate:
//!
//! - [`InMemoryStorage`]: a lock-guarded map, for tests and volatile caches
//! - [`LmdbStorage`]: a persistent LMDB environment via heed
//!
//! # Contract
//!
//! `put` followed by `get` on the same `(session, key)` returns an envelope
//! equal to what was written, until superseded by another `put`, a `delete`,
//! or a `clear` whose prefix matches the key. A `None` session or an empty
//! session name addresses the global namespace.
//!
//! Methods are synchronous. The engine dispatches reads onto its configured
//! scheduler, so backends are free to block on disk I/O. Implementations must
//! be safe for concurrent use from several requests at once.

use rxcache_core::{CacheResult, StoredEnvelope};
use serde_json::Value;

pub mod lmdb;
pub mod memory;

#[cfg(test)]
mod contract_tests;

pub use lmdb::{LmdbConfig, LmdbStorage, LmdbStorageError};
pub use memory::InMemoryStorage;

/// A session-scoped key-value store for cache envelopes.
pub trait Storage: Send + Sync {
    /// Release backend resources. Further calls may fail.
    fn close(&self) -> CacheResult<()> {
        Ok(())
    }

    /// Remove every entry in every namespace.
    fn clear(&self) -> CacheResult<()>;

    /// Remove every entry of the given sessions. `""` is the global namespace.
    fn clear_sessions(&self, sessions: &[&str]) -> CacheResult<()> {
        for session in sessions {
            self.clear_prefix(Some(session), "")?;
        }
        Ok(())
    }

    /// Remove entries of `session` whose raw key starts with `key_prefix`.
    fn clear_prefix(&self, session: Option<&str>, key_prefix: &str) -> CacheResult<()>;

    /// Remove a single entry. Removing a missing entry is not an error.
    fn delete(&self, session: Option<&str>, key: &str) -> CacheResult<()>;

    /// Store an envelope, replacing any previous one. `None` stores a
    /// value-less entry: `exists` reports it, `get` does not return it.
    fn put(
        &self,
        session: Option<&str>,
        key: &str,
        envelope: Option<&StoredEnvelope>,
    ) -> CacheResult<()>;

    /// Read the envelope stored under `(session, key)`.
    fn get(&self, session: Option<&str>, key: &str) -> CacheResult<Option<StoredEnvelope>>;

    /// Read an envelope, or wrap `default` in a freshly timestamped one.
    fn get_or_default(
        &self,
        session: Option<&str>,
        key: &str,
        default: Value,
    ) -> CacheResult<StoredEnvelope> {
        Ok(self
            .get(session, key)?
            .unwrap_or_else(|| StoredEnvelope::new(Some(default))))
    }

    /// True if an entry (even a value-less one) exists.
    fn exists(&self, session: Option<&str>, key: &str) -> CacheResult<bool>;

    /// Number of entries across all namespaces.
    fn count(&self) -> CacheResult<u64>;

    /// Number of entries in the given sessions. `""` is the global namespace.
    fn count_sessions(&self, sessions: &[&str]) -> CacheResult<u64> {
        let mut total = 0;
        for session in sessions {
            total += self.count_prefix(Some(session), "")?;
        }
        Ok(total)
    }

    /// Number of entries of `session` whose raw key starts with `key_prefix`.
    fn count_prefix(&self, session: Option<&str>, key_prefix: &str) -> CacheResult<u64>;
}
