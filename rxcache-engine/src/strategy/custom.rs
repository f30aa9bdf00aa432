use std::fmt;
use std::sync::Arc;

use rxcache_core::Cacheable;

use super::{CacheStrategy, EnvelopeStream};
use crate::lookup::CacheLookup;
use crate::source::SourceOperation;

type ResolveFn<T> = dyn Fn(CacheLookup<T>, SourceOperation<T>) -> EnvelopeStream<T> + Send + Sync;

/// A named strategy built from a closure.
///
/// ```ignore
/// use futures_util::{future, stream::{self, StreamExt}};
///
/// // Serve the cache when present, never surface a source error.
/// let strategy = CustomStrategy::new("CACHE_OR_NOTHING", |cache, source| {
///     stream::once(async move {
///         match cache.read().await {
///             Ok(Some(envelope)) => Some(Ok(envelope)),
///             Ok(None) => source.run().await.ok().map(Ok),
///             Err(error) => Some(Err(error)),
///         }
///     })
///     .filter_map(future::ready)
///     .boxed()
/// });
/// ```
pub struct CustomStrategy<T> {
    name: String,
    resolve: Arc<ResolveFn<T>>,
}

impl<T> CustomStrategy<T> {
    pub fn new<F>(name: impl Into<String>, resolve: F) -> Self
    where
        F: Fn(CacheLookup<T>, SourceOperation<T>) -> EnvelopeStream<T> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            resolve: Arc::new(resolve),
        }
    }
}

impl<T> Clone for CustomStrategy<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            resolve: Arc::clone(&self.resolve),
        }
    }
}

impl<T> fmt::Debug for CustomStrategy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomStrategy")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for CustomStrategy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl<T: Cacheable> CacheStrategy<T> for CustomStrategy<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, cache: CacheLookup<T>, source: SourceOperation<T>) -> EnvelopeStream<T> {
        (self.resolve)(cache, source)
    }
}
