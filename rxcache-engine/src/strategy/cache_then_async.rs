use std::fmt;

use async_stream::stream;
use rxcache_core::Cacheable;

use super::{CacheStrategy, EnvelopeStream};
use crate::lookup::CacheLookup;
use crate::source::SourceOperation;

/// Emit the cached value if there is one, then always run the source and
/// emit its value.
///
/// The cached value is always observed first. A failing cache read ends the
/// stream before the source runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheThenAsync;

impl CacheThenAsync {
    pub const NAME: &'static str = "CACHE_THEN_ASYNC";
}

impl fmt::Display for CacheThenAsync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::NAME)
    }
}

impl<T: Cacheable> CacheStrategy<T> for CacheThenAsync {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn resolve(&self, cache: CacheLookup<T>, source: SourceOperation<T>) -> EnvelopeStream<T> {
        Box::pin(stream! {
            match cache.read().await {
                Ok(Some(envelope)) => {
                    yield Ok(envelope);
                }
                Ok(None) => {}
                Err(error) => {
                    yield Err(error);
                    return;
                }
            }

            yield source.run().await;
        })
    }
}
