//! RxCache Test Utilities
//!
//! Centralized test infrastructure for the RxCache workspace:
//! - Mock producers with call counting
//! - An instrumented storage with failure injection and read latency
//! - Fixtures for seeding entries of a given age
//! - Proptest generators for keys, sessions and TTLs
//! - Tracing setup for tests

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

pub use rxcache_core::{
    now_millis, AsyncSource, CacheEnvelope, CacheError, CacheResult, SourceError, StorageError,
    StoredEnvelope, TimeUnit, Ttl,
};
pub use rxcache_storage::{InMemoryStorage, Storage};

// ============================================================================
// TRACING
// ============================================================================

/// Install a fmt subscriber honoring `RUST_LOG` (default `warn`).
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// MOCK PRODUCERS
// ============================================================================

/// A reusable producer returning a fixed outcome and counting its calls.
#[derive(Debug, Clone)]
pub struct MockSource<T> {
    outcome: Result<T, SourceError>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl<T: Clone + Send + Sync + 'static> MockSource<T> {
    pub fn ok(value: T) -> Self {
        Self {
            outcome: Ok(value),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            outcome: Err(SourceError::failed(reason)),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleep before producing the outcome.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of times the producer was started.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// A one-shot future for `with_async`, counted like [`AsyncSource::fetch`].
    pub fn produce(&self) -> impl Future<Output = Result<T, SourceError>> + Send + 'static {
        let source = self.clone();
        async move { source.fetch().await }
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> AsyncSource<T> for MockSource<T> {
    async fn fetch(&self) -> Result<T, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }
}

/// A producer that fails the test if it is ever polled.
#[allow(unreachable_code)]
pub fn must_not_run<T: Send + 'static>() -> impl Future<Output = Result<T, SourceError>> + Send + 'static {
    async {
        let outcome: Result<T, SourceError> = panic!("producer must not be invoked");
        outcome
    }
}

// ============================================================================
// INSTRUMENTED STORAGE
// ============================================================================

/// An [`InMemoryStorage`] that counts calls, can fail on demand and can
/// slow its reads down.
#[derive(Debug, Default)]
pub struct InstrumentedStorage {
    inner: InMemoryStorage,
    reads: AtomicUsize,
    writes: AtomicUsize,
    deletes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    read_latency: Option<Duration>,
}

impl InstrumentedStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing storage; clones of `inner` observe the same entries.
    pub fn wrapping(inner: InMemoryStorage) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Block every `get` for `latency`.
    pub fn with_read_latency(mut self, latency: Duration) -> Self {
        self.read_latency = Some(latency);
        self
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `get` calls.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `put` calls, failed ones included.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &InMemoryStorage {
        &self.inner
    }
}

impl Storage for InstrumentedStorage {
    fn clear(&self) -> CacheResult<()> {
        self.inner.clear()
    }

    fn clear_prefix(&self, session: Option<&str>, key_prefix: &str) -> CacheResult<()> {
        self.inner.clear_prefix(session, key_prefix)
    }

    fn delete(&self, session: Option<&str>, key: &str) -> CacheResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(session, key)
    }

    fn put(
        &self,
        session: Option<&str>,
        key: &str,
        envelope: Option<&StoredEnvelope>,
    ) -> CacheResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed {
                key: key.to_string(),
                reason: "injected write failure".to_string(),
            }
            .into());
        }
        self.inner.put(session, key, envelope)
    }

    fn get(&self, session: Option<&str>, key: &str) -> CacheResult<Option<StoredEnvelope>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.read_latency {
            std::thread::sleep(latency);
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::ReadFailed {
                key: key.to_string(),
                reason: "injected read failure".to_string(),
            }
            .into());
        }
        self.inner.get(session, key)
    }

    fn exists(&self, session: Option<&str>, key: &str) -> CacheResult<bool> {
        self.inner.exists(session, key)
    }

    fn count(&self) -> CacheResult<u64> {
        self.inner.count()
    }

    fn count_prefix(&self, session: Option<&str>, key_prefix: &str) -> CacheResult<u64> {
        self.inner.count_prefix(session, key_prefix)
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// Envelope for `value` captured `age` ago.
pub fn envelope_aged<T: Serialize>(value: &T, age: Duration) -> StoredEnvelope {
    let captured_at = now_millis() - i64::try_from(age.as_millis()).unwrap_or(i64::MAX);
    CacheEnvelope::with_captured_at(captured_at, value)
        .to_stored()
        .expect("fixture payload should serialize")
}

/// Store `value` under `(session, key)` as if cached `age` ago.
pub fn seed<T: Serialize>(
    storage: &dyn Storage,
    session: Option<&str>,
    key: &str,
    value: &T,
    age: Duration,
) {
    storage
        .put(session, key, Some(&envelope_aged(value, age)))
        .expect("seeding storage should succeed");
}

/// Store a fresh `value` under `(session, key)`.
pub fn seed_fresh<T: Serialize>(storage: &dyn Storage, session: Option<&str>, key: &str, value: &T) {
    seed(storage, session, key, value, Duration::ZERO);
}

/// Read back the payload stored under `(session, key)`.
pub fn stored_payload(
    storage: &dyn Storage,
    session: Option<&str>,
    key: &str,
) -> Option<serde_json::Value> {
    storage
        .get(session, key)
        .expect("reading storage should succeed")
        .and_then(CacheEnvelope::into_payload)
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;

    /// Session names, including the empty (global) one.
    pub fn arb_session() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some(String::new())),
            "[a-z][a-z0-9-]{0,11}".prop_map(Some),
        ]
    }

    /// Keys without the namespace separator.
    pub fn arb_key() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9-]{1,16}"
    }

    pub fn arb_time_unit() -> impl Strategy<Value = TimeUnit> {
        prop_oneof![
            Just(TimeUnit::Milliseconds),
            Just(TimeUnit::Seconds),
            Just(TimeUnit::Minutes),
            Just(TimeUnit::Hours),
            Just(TimeUnit::Days),
        ]
    }

    /// TTLs of at least one second.
    pub fn arb_ttl() -> impl Strategy<Value = Ttl> {
        prop_oneof![
            (1_000u64..86_400_000).prop_map(Ttl::millis),
            (1u64..86_400).prop_map(Ttl::seconds),
            (1u64..1_440).prop_map(Ttl::minutes),
            (1u64..48).prop_map(Ttl::hours),
            (1u64..30).prop_map(Ttl::days),
        ]
    }

    /// JSON-friendly payloads.
    pub fn arb_payload() -> impl Strategy<Value = String> {
        "[ -~]{0,32}"
    }
}
