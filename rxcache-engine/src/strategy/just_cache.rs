use std::fmt;

use futures_util::stream::{self, StreamExt};
use rxcache_core::Cacheable;

use super::{CacheStrategy, EnvelopeStream};
use crate::lookup::CacheLookup;
use crate::source::SourceOperation;

/// Emit the cached value if there is one. The source is dropped unpolled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JustCache;

impl JustCache {
    pub const NAME: &'static str = "JUST_CACHE";
}

impl fmt::Display for JustCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::NAME)
    }
}

impl<T: Cacheable> CacheStrategy<T> for JustCache {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn resolve(&self, cache: CacheLookup<T>, source: SourceOperation<T>) -> EnvelopeStream<T> {
        drop(source);

        stream::once(async move { cache.read().await.transpose() })
            .filter_map(futures_util::future::ready)
            .boxed()
    }
}
