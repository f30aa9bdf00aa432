//! RxCache Core - Data Types and Contracts
//!
//! Pure data structures shared by the storage backends and the resolution
//! engine: the cached envelope, TTLs, session-scoped keys, key patterns, the
//! producer trait, and the error taxonomy. Nothing here performs I/O.

pub mod envelope;
pub mod error;
pub mod key;
pub mod key_pattern;
pub mod source;
pub mod ttl;

pub use envelope::{now_millis, CacheEnvelope, StoredEnvelope};
pub use error::{CacheError, CacheResult, ConfigError, SourceError, StorageError};
pub use key::{StorageKey, GLOBAL_NAMESPACE, SEPARATOR};
pub use key_pattern::resolve_key;
pub use source::AsyncSource;
pub use ttl::{TimeUnit, Ttl};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Marker trait for payload types that can flow through the cache.
///
/// Payloads are persisted as JSON, so they must round-trip through serde, and
/// they cross task boundaries, so they must be `Send + Sync + 'static`.
pub trait Cacheable: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Cacheable for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}
