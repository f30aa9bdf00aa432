//! The source branch of a request, with write-through.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture};
use rxcache_core::{CacheEnvelope, CacheResult, Cacheable, SourceError, StorageKey};
use rxcache_storage::Storage;

use crate::scheduler::Scheduler;

/// A single-shot producer of a fresh envelope.
///
/// Built by the engine around the caller's producer: on success the value is
/// timestamped, written to storage and only then returned. A failed write is
/// logged and the value is still returned. A failed producer writes nothing.
pub struct SourceOperation<T> {
    future: BoxFuture<'static, CacheResult<CacheEnvelope<T>>>,
}

impl<T> fmt::Debug for SourceOperation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceOperation").finish_non_exhaustive()
    }
}

impl<T: Cacheable> SourceOperation<T> {
    /// Wrap an arbitrary envelope-producing future, without write-through.
    pub fn new(future: BoxFuture<'static, CacheResult<CacheEnvelope<T>>>) -> Self {
        Self { future }
    }

    /// An operation that never completes. Used when a request has no producer.
    pub fn never() -> Self {
        Self::new(Box::pin(future::pending()))
    }

    /// Wrap `producer` so its value is persisted under `key` before being
    /// returned.
    pub fn write_through<F>(
        producer: F,
        storage: Arc<dyn Storage>,
        key: StorageKey,
        scheduler: Scheduler,
    ) -> Self
    where
        F: Future<Output = Result<T, SourceError>> + Send + 'static,
    {
        Self::new(Box::pin(async move {
            let envelope = CacheEnvelope::new(producer.await?);

            if let Err(error) = persist(&envelope, storage, key.clone(), &scheduler).await {
                tracing::warn!(key = %key, %error, "Write-through failed, value delivered uncached");
            }

            Ok(envelope)
        }))
    }

    /// Drive the operation to completion.
    pub async fn run(self) -> CacheResult<CacheEnvelope<T>> {
        self.future.await
    }
}

async fn persist<T: Cacheable>(
    envelope: &CacheEnvelope<T>,
    storage: Arc<dyn Storage>,
    key: StorageKey,
    scheduler: &Scheduler,
) -> CacheResult<()> {
    let stored = envelope.to_stored()?;
    scheduler
        .run(move || storage.put(key.session(), key.key(), Some(&stored)))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rxcache_core::{CacheError, StoredEnvelope};
    use rxcache_storage::InMemoryStorage;
    use std::time::Duration;

    fn key() -> StorageKey {
        StorageKey::new(Some("s"), "k")
    }

    #[tokio::test]
    async fn test_success_is_written_before_delivery() {
        let storage = InMemoryStorage::new();
        let operation = SourceOperation::write_through(
            async { Ok::<_, SourceError>("fresh".to_string()) },
            Arc::new(storage.clone()),
            key(),
            Scheduler::Io,
        );

        let envelope = operation.run().await.expect("producer succeeds");
        assert_eq!(envelope.payload(), "fresh");
        assert!(!envelope.is_served_from_cache());

        let stored = storage.get(Some("s"), "k").expect("get").expect("written");
        assert_eq!(stored, envelope.to_stored().expect("serializable"));
    }

    #[tokio::test]
    async fn test_failure_writes_nothing() {
        let storage = InMemoryStorage::new();
        let operation: SourceOperation<String> = SourceOperation::write_through(
            async { Err(SourceError::failed("offline")) },
            Arc::new(storage.clone()),
            key(),
            Scheduler::Immediate,
        );

        assert_eq!(
            operation.run().await,
            Err(CacheError::Source(SourceError::failed("offline")))
        );
        assert_eq!(storage.count().expect("count"), 0);
    }

    struct ReadOnlyStorage;

    impl Storage for ReadOnlyStorage {
        fn clear(&self) -> CacheResult<()> {
            Ok(())
        }
        fn clear_prefix(&self, _: Option<&str>, _: &str) -> CacheResult<()> {
            Ok(())
        }
        fn delete(&self, _: Option<&str>, _: &str) -> CacheResult<()> {
            Ok(())
        }
        fn put(&self, _: Option<&str>, key: &str, _: Option<&StoredEnvelope>) -> CacheResult<()> {
            Err(rxcache_core::StorageError::WriteFailed {
                key: key.to_string(),
                reason: "read-only".to_string(),
            }
            .into())
        }
        fn get(&self, _: Option<&str>, _: &str) -> CacheResult<Option<StoredEnvelope>> {
            Ok(None)
        }
        fn exists(&self, _: Option<&str>, _: &str) -> CacheResult<bool> {
            Ok(false)
        }
        fn count(&self) -> CacheResult<u64> {
            Ok(0)
        }
        fn count_prefix(&self, _: Option<&str>, _: &str) -> CacheResult<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_write_failure_still_delivers() {
        let operation = SourceOperation::write_through(
            async { Ok::<_, SourceError>(5u32) },
            Arc::new(ReadOnlyStorage),
            key(),
            Scheduler::Io,
        );
        assert_eq!(operation.run().await.expect("value delivered").into_payload(), 5);
    }

    #[tokio::test]
    async fn test_never_does_not_complete() {
        let operation: SourceOperation<u32> = SourceOperation::never();
        let outcome = tokio::time::timeout(Duration::from_millis(20), operation.run()).await;
        assert!(outcome.is_err());
    }
}
