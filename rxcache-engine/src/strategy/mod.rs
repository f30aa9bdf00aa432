//! Resolution strategies.
//!
//! A strategy combines the two branches of a request, a [`CacheLookup`] and a
//! [`SourceOperation`], into an ordered stream of envelopes that ends either
//! cleanly or with exactly one error. Strategies are immutable values, so one
//! instance can serve any number of requests.
//!
//! | Strategy | Emits | Source failure |
//! |---|---|---|
//! | [`CacheThenAsync`] | cached value (if any), then fresh value | propagated after the cached value |
//! | [`CacheOrAsync`] | a valid cached value, or a fresh one | swallowed if any cached value exists |
//! | [`JustCache`] | cached value (if any) | source never runs |
//! | [`NoCache`] | fresh value | propagated |
//! | [`AsyncOrCache`] | fresh value, or the cached one on failure | swallowed if any cached value exists |
//!
//! Storage read failures are never swallowed.

use std::fmt;

use futures_util::stream::BoxStream;
use rxcache_core::{CacheEnvelope, CacheError, CacheResult, Cacheable};

use crate::lookup::CacheLookup;
use crate::source::SourceOperation;

mod async_or_cache;
mod cache_or_async;
mod cache_then_async;
mod custom;
mod just_cache;
mod no_cache;

pub use async_or_cache::AsyncOrCache;
pub use cache_or_async::CacheOrAsync;
pub use cache_then_async::CacheThenAsync;
pub use custom::CustomStrategy;
pub use just_cache::JustCache;
pub use no_cache::NoCache;

/// The output of a strategy: envelopes in emission order, at most one error,
/// which is always the last item.
pub type EnvelopeStream<T> = BoxStream<'static, CacheResult<CacheEnvelope<T>>>;

/// A policy combining a cache read and a source run.
pub trait CacheStrategy<T>: fmt::Display + Send + Sync {
    /// Stable identifier, e.g. `CACHE_OR_ASYNC`.
    fn name(&self) -> &str;

    /// Build the resolution stream. Nothing runs until the stream is polled.
    fn resolve(&self, cache: CacheLookup<T>, source: SourceOperation<T>) -> EnvelopeStream<T>;
}

/// Re-read the cache after the source failed with `error`, ignoring TTL.
///
/// An empty cache surfaces the source error. A read failure surfaces the
/// read failure.
pub(crate) async fn fall_back_to_cache<T: Cacheable>(
    strategy: &str,
    cache: &CacheLookup<T>,
    error: CacheError,
) -> CacheResult<CacheEnvelope<T>> {
    match cache.read().await? {
        Some(envelope) => {
            tracing::debug!(
                strategy,
                key = %cache.key(),
                %error,
                "Source failed, serving cached value"
            );
            Ok(envelope)
        }
        None => Err(error),
    }
}
