//! Per-request configuration.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::stream::{BoxStream, StreamExt};
use rxcache_core::{AsyncSource, CacheEnvelope, CacheResult, Cacheable, SourceError, StorageKey, Ttl};
use rxcache_storage::Storage;
use tokio_util::sync::CancellationToken;

use crate::config::CacheConfig;
use crate::lookup::CacheLookup;
use crate::scheduler::Scheduler;
use crate::source::SourceOperation;
use crate::strategy::{CacheOrAsync, CacheStrategy, EnvelopeStream};

type Producer<T> = BoxFuture<'static, Result<T, SourceError>>;

/// Accumulates the settings of one request, then resolves it.
///
/// Created by [`RxCache::from_key`](crate::RxCache::from_key) with the key
/// already resolved and the cache defaults applied. Every setter consumes
/// the builder, so a builder is never shared between requests.
///
/// Unless a strategy is chosen, the request uses [`CacheOrAsync`] with this
/// builder's TTL and keep-expired flag. Without a producer, the source
/// branch never completes.
pub struct StrategyBuilder<T> {
    storage: Arc<dyn Storage>,
    key: String,
    session: Option<String>,
    ttl: Ttl,
    keep_expired: bool,
    scheduler: Scheduler,
    strategy: Option<Arc<dyn CacheStrategy<T>>>,
    producer: Option<Producer<T>>,
    cancellation: Option<CancellationToken>,
}

impl<T: Cacheable> StrategyBuilder<T> {
    pub(crate) fn new(storage: Arc<dyn Storage>, key: String, config: &CacheConfig) -> Self {
        Self {
            storage,
            key,
            session: config.default_session.clone(),
            ttl: config.default_ttl,
            keep_expired: false,
            scheduler: config.default_scheduler.clone(),
            strategy: None,
            producer: None,
            cancellation: None,
        }
    }

    /// The resolved key, without session.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    pub fn with_strategy<S>(self, strategy: S) -> Self
    where
        S: CacheStrategy<T> + 'static,
    {
        self.with_shared_strategy(Arc::new(strategy))
    }

    /// Use a strategy instance shared with other requests.
    pub fn with_shared_strategy(mut self, strategy: Arc<dyn CacheStrategy<T>>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// TTL of the default strategy. Ignored once a strategy is set explicitly.
    pub fn with_ttl(mut self, ttl: Ttl) -> Self {
        self.ttl = ttl;
        self
    }

    /// Scope the request to `session`. An empty name is the global namespace.
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        let session = session.into();
        self.session = (!session.is_empty()).then_some(session);
        self
    }

    /// Scope the request to the global namespace, overriding the cache default.
    pub fn with_global_session(mut self) -> Self {
        self.session = None;
        self
    }

    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Serve expired cached values from the default strategy.
    pub fn keep_expired_cache(mut self) -> Self {
        self.keep_expired = true;
        self
    }

    pub fn ignore_expired_cache(mut self) -> Self {
        self.keep_expired = false;
        self
    }

    /// Use `producer` for fresh values. It is polled at most once, and only if
    /// the strategy needs a fresh value.
    pub fn with_async<F, E>(mut self, producer: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<SourceError>,
    {
        self.producer = Some(Box::pin(async move { producer.await.map_err(Into::into) }));
        self
    }

    /// Use a reusable [`AsyncSource`] for fresh values.
    pub fn with_source(mut self, source: Arc<dyn AsyncSource<T>>) -> Self {
        self.producer = Some(Box::pin(async move { source.fetch().await }));
        self
    }

    /// End the stream, without further values, once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Resolve the request into a stream of envelopes.
    ///
    /// Nothing runs until the stream is polled. Dropping the stream cancels
    /// the request, though a write-through already handed to storage still
    /// completes.
    pub fn fetch_envelope(self) -> EnvelopeStream<T> {
        let key = StorageKey::new(self.session.as_deref(), self.key);
        let strategy: Arc<dyn CacheStrategy<T>> = match self.strategy {
            Some(strategy) => strategy,
            None => Arc::new(CacheOrAsync::new(self.ttl, self.keep_expired)),
        };

        let cache = CacheLookup::new(Arc::clone(&self.storage), key.clone(), self.scheduler.clone());
        let source = match self.producer {
            Some(producer) => {
                SourceOperation::write_through(producer, self.storage, key.clone(), self.scheduler)
            }
            None => SourceOperation::never(),
        };

        tracing::trace!(key = %key, strategy = %strategy, "Resolving cache request");
        let stream = strategy.resolve(cache, source);

        match self.cancellation {
            Some(token) => stream
                .take_until(async move { token.cancelled().await })
                .boxed(),
            None => stream,
        }
    }

    /// Like [`StrategyBuilder::fetch_envelope`], yielding bare payloads.
    pub fn fetch(self) -> BoxStream<'static, CacheResult<T>> {
        self.fetch_envelope()
            .map(|item| item.map(CacheEnvelope::into_payload))
            .boxed()
    }
}

impl<T> fmt::Debug for StrategyBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyBuilder")
            .field("key", &self.key)
            .field("session", &self.session)
            .field("ttl", &self.ttl)
            .field("keep_expired", &self.keep_expired)
            .field("scheduler", &self.scheduler)
            .field("strategy", &self.strategy.as_ref().map(|s| s.to_string()))
            .field("has_producer", &self.producer.is_some())
            .finish()
    }
}
