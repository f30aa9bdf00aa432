use std::fmt;

use async_stream::stream;
use rxcache_core::{Cacheable, Ttl};

use super::{fall_back_to_cache, CacheStrategy, EnvelopeStream};
use crate::lookup::CacheLookup;
use crate::source::SourceOperation;

/// Serve a valid cached value, otherwise run the source.
///
/// A cached value is valid while `now < captured_at + ttl`, or always when
/// `keep_expired` is set. If the source fails, the cache is read again with
/// no TTL check and any value found there is served instead of the error.
///
/// This is the default strategy of a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheOrAsync {
    ttl: Ttl,
    keep_expired: bool,
}

impl CacheOrAsync {
    pub const NAME: &'static str = "CACHE_OR_ASYNC";

    pub fn new(ttl: Ttl, keep_expired: bool) -> Self {
        Self { ttl, keep_expired }
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    pub fn keeps_expired(&self) -> bool {
        self.keep_expired
    }
}

impl fmt::Display for CacheOrAsync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{{keep_expired={}, ttl={}}}",
            Self::NAME,
            self.keep_expired,
            self.ttl
        )
    }
}

impl<T: Cacheable> CacheStrategy<T> for CacheOrAsync {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn resolve(&self, cache: CacheLookup<T>, source: SourceOperation<T>) -> EnvelopeStream<T> {
        let ttl = self.ttl;
        let keep_expired = self.keep_expired;

        Box::pin(stream! {
            match cache.read().await {
                Ok(Some(envelope)) if envelope.is_valid_for(ttl, keep_expired) => {
                    yield Ok(envelope);
                    return;
                }
                Ok(Some(envelope)) => {
                    tracing::debug!(
                        key = %cache.key(),
                        captured_at = %envelope.captured_at(),
                        %ttl,
                        "Cached value expired"
                    );
                }
                Ok(None) => {}
                Err(error) => {
                    yield Err(error);
                    return;
                }
            }

            yield match source.run().await {
                Ok(envelope) => Ok(envelope),
                Err(error) => fall_back_to_cache(CacheOrAsync::NAME, &cache, error).await,
            };
        })
    }
}
