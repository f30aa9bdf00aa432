//! RxCache Engine - Cache Resolution
//!
//! Combines a session-scoped [`Storage`] with caller-supplied asynchronous
//! producers. Each request picks a [`CacheStrategy`] deciding whether the
//! cached value, a fresh value, or both are delivered, and what happens when
//! the producer fails. Fresh values are written through to storage before
//! they are delivered.
//!
//! # Example
//!
//! ```ignore
//! use futures_util::StreamExt;
//! use rxcache_engine::{RxCache, CacheThenAsync};
//! use rxcache_storage::InMemoryStorage;
//!
//! let cache = RxCache::new(InMemoryStorage::new());
//! let mut profiles = cache
//!     .from_key::<Profile>("profile_{}", &[&user_id])?
//!     .with_session("alice")
//!     .with_strategy(CacheThenAsync)
//!     .with_async(api.load_profile(user_id))
//!     .fetch();
//!
//! while let Some(profile) = profiles.next().await {
//!     render(profile?);
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use rxcache_core::{resolve_key, CacheResult, Cacheable, Ttl};
use rxcache_storage::Storage;

pub mod builder;
pub mod config;
pub mod lookup;
pub mod scheduler;
pub mod source;
pub mod strategy;

pub use builder::StrategyBuilder;
pub use config::CacheConfig;
pub use lookup::CacheLookup;
pub use scheduler::Scheduler;
pub use source::SourceOperation;
pub use strategy::{
    AsyncOrCache, CacheOrAsync, CacheStrategy, CacheThenAsync, CustomStrategy, EnvelopeStream,
    JustCache, NoCache,
};

/// Entry point: a storage plus the defaults applied to every request.
///
/// Cheap to clone. Clones share the storage.
#[derive(Clone)]
pub struct RxCache {
    storage: Arc<dyn Storage>,
    config: CacheConfig,
}

impl RxCache {
    pub fn new<S: Storage + 'static>(storage: S) -> Self {
        Self::with_config(storage, CacheConfig::default())
    }

    pub fn with_config<S: Storage + 'static>(storage: S, config: CacheConfig) -> Self {
        Self::from_shared(Arc::new(storage), config)
    }

    /// Use a storage that is also held elsewhere.
    pub fn from_shared(storage: Arc<dyn Storage>, config: CacheConfig) -> Self {
        Self { storage, config }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn with_default_session(&self, session: impl Into<String>) -> Self {
        self.reconfigured(|config| config.with_default_session(session))
    }

    pub fn with_default_ttl(&self, ttl: Ttl) -> Self {
        self.reconfigured(|config| config.with_default_ttl(ttl))
    }

    pub fn with_default_scheduler(&self, scheduler: Scheduler) -> Self {
        self.reconfigured(|config| config.with_default_scheduler(scheduler))
    }

    fn reconfigured(&self, f: impl FnOnce(CacheConfig) -> CacheConfig) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            config: f(self.config.clone()),
        }
    }

    /// Start a request for the key built from `pattern` and `args`.
    ///
    /// The key is resolved here, once. A malformed pattern or a wrong number
    /// of arguments fails immediately with a config error.
    pub fn from_key<T: Cacheable>(
        &self,
        pattern: &str,
        args: &[&dyn fmt::Display],
    ) -> CacheResult<StrategyBuilder<T>> {
        let key = resolve_key(pattern, args)?;
        Ok(StrategyBuilder::new(Arc::clone(&self.storage), key, &self.config))
    }

    /// Close the underlying storage.
    pub fn close(&self) -> CacheResult<()> {
        self.storage.close()
    }
}

impl fmt::Debug for RxCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RxCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rxcache_core::{CacheError, ConfigError};
    use rxcache_storage::InMemoryStorage;

    #[test]
    fn test_from_key_resolves_eagerly() {
        let cache = RxCache::new(InMemoryStorage::new());
        let builder = cache
            .from_key::<String>("user_{}_{}", &[&42, &"posts"])
            .expect("valid pattern");
        assert_eq!(builder.key(), "user_42_posts");
        assert_eq!(builder.session(), None);
    }

    #[test]
    fn test_from_key_fails_fast() {
        let cache = RxCache::new(InMemoryStorage::new());
        let err = cache
            .from_key::<String>("user_{}_{}", &[&42])
            .expect_err("missing argument");
        assert!(matches!(
            err,
            CacheError::Config(ConfigError::ArgumentCountMismatch { expected: 2, got: 1, .. })
        ));

        let err = cache
            .from_key::<String>("user_{", &[])
            .expect_err("malformed pattern");
        assert!(matches!(err, CacheError::Config(ConfigError::MalformedKeyPattern { .. })));
    }

    #[test]
    fn test_defaults_flow_into_requests() {
        let cache = RxCache::new(InMemoryStorage::new()).with_default_session("alice");
        let builder = cache.from_key::<u32>("k", &[]).expect("valid pattern");
        assert_eq!(builder.session(), Some("alice"));

        let builder = builder.with_global_session();
        assert_eq!(builder.session(), None);

        let builder = cache
            .from_key::<u32>("k", &[])
            .expect("valid pattern")
            .with_session("");
        assert_eq!(builder.session(), None);
    }

    #[test]
    fn test_reconfiguring_leaves_original_untouched() {
        let cache = RxCache::new(InMemoryStorage::new());
        let hourly = cache.with_default_ttl(Ttl::hours(1));
        assert_eq!(cache.config().default_ttl, Ttl::default());
        assert_eq!(hourly.config().default_ttl, Ttl::hours(1));
        assert!(Arc::ptr_eq(cache.storage(), hourly.storage()));
    }
}
