use std::fmt;

use async_stream::stream;
use rxcache_core::Cacheable;

use super::{fall_back_to_cache, CacheStrategy, EnvelopeStream};
use crate::lookup::CacheLookup;
use crate::source::SourceOperation;

/// Run the source first. On failure, serve whatever the cache holds,
/// regardless of age, or the source error if the cache is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AsyncOrCache;

impl AsyncOrCache {
    pub const NAME: &'static str = "ASYNC_OR_CACHE";
}

impl fmt::Display for AsyncOrCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::NAME)
    }
}

impl<T: Cacheable> CacheStrategy<T> for AsyncOrCache {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn resolve(&self, cache: CacheLookup<T>, source: SourceOperation<T>) -> EnvelopeStream<T> {
        Box::pin(stream! {
            yield match source.run().await {
                Ok(envelope) => Ok(envelope),
                Err(error) => fall_back_to_cache(AsyncOrCache::NAME, &cache, error).await,
            };
        })
    }
}
