use std::fmt;

use futures_util::stream::{self, StreamExt};
use rxcache_core::Cacheable;

use super::{CacheStrategy, EnvelopeStream};
use crate::lookup::CacheLookup;
use crate::source::SourceOperation;

/// Ignore the cache and emit the source's value or error.
///
/// The fresh value is still written through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoCache;

impl NoCache {
    pub const NAME: &'static str = "NO_CACHE";
}

impl fmt::Display for NoCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::NAME)
    }
}

impl<T: Cacheable> CacheStrategy<T> for NoCache {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn resolve(&self, _cache: CacheLookup<T>, source: SourceOperation<T>) -> EnvelopeStream<T> {
        stream::once(source.run()).boxed()
    }
}
