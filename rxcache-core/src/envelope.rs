//! The stored unit: a payload plus the time it was captured.
//!
//! Every value flowing through a resolution strategy is a [`CacheEnvelope`].
//! Storage backends only ever see the type-erased [`StoredEnvelope`], whose
//! payload is JSON and may be absent.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::error::StorageError;
use crate::ttl::Ttl;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A cached payload with its capture timestamp.
///
/// `served_from_cache` is call-site metadata set by the engine when the value
/// was read back from storage. It is never persisted and does not take part
/// in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEnvelope<T> {
    payload: T,
    captured_at_millis: i64,
    #[serde(skip)]
    served_from_cache: bool,
}

/// The type-erased form handed to storage backends.
pub type StoredEnvelope = CacheEnvelope<Option<Value>>;

impl<T> CacheEnvelope<T> {
    /// Wrap a freshly produced value, timestamped now.
    pub fn new(payload: T) -> Self {
        Self::with_captured_at(now_millis(), payload)
    }

    /// Wrap a value captured at a known time.
    pub fn with_captured_at(captured_at_millis: i64, payload: T) -> Self {
        Self {
            payload,
            captured_at_millis,
            served_from_cache: false,
        }
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn into_payload(self) -> T {
        self.payload
    }

    pub fn captured_at_millis(&self) -> i64 {
        self.captured_at_millis
    }

    /// Capture time as a UTC timestamp. Out-of-range values clamp to the epoch.
    pub fn captured_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.captured_at_millis).unwrap_or_default()
    }

    /// True when the engine read this envelope back from storage.
    pub fn is_served_from_cache(&self) -> bool {
        self.served_from_cache
    }

    pub fn mark_served_from_cache(mut self) -> Self {
        self.served_from_cache = true;
        self
    }

    /// How long ago the payload was captured.
    pub fn staleness(&self) -> Duration {
        let age = now_millis().saturating_sub(self.captured_at_millis);
        Duration::from_millis(u64::try_from(age).unwrap_or(0))
    }

    /// TTL validity as of `now_millis`: `keep_expired || now < captured_at + ttl`.
    pub fn is_valid_at(&self, now_millis: i64, ttl: Ttl, keep_expired: bool) -> bool {
        keep_expired || now_millis < self.captured_at_millis.saturating_add(ttl.as_millis())
    }

    /// TTL validity as of the current wall-clock time.
    pub fn is_valid_for(&self, ttl: Ttl, keep_expired: bool) -> bool {
        self.is_valid_at(now_millis(), ttl, keep_expired)
    }

    /// Map the payload, keeping timestamp and cache flag.
    pub fn map<U, F>(self, f: F) -> CacheEnvelope<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheEnvelope {
            payload: f(self.payload),
            captured_at_millis: self.captured_at_millis,
            served_from_cache: self.served_from_cache,
        }
    }
}

impl<T: Serialize> CacheEnvelope<T> {
    /// Erase the payload type for storage. A payload serializing to JSON
    /// `null` is stored as absent.
    pub fn to_stored(&self) -> Result<StoredEnvelope, StorageError> {
        let value = serde_json::to_value(&self.payload).map_err(|e| {
            StorageError::Serialization {
                reason: e.to_string(),
            }
        })?;
        Ok(StoredEnvelope::from_value(self.captured_at_millis, value))
    }
}

impl StoredEnvelope {
    /// Build a stored envelope, normalizing JSON `null` to an absent payload.
    pub fn from_value(captured_at_millis: i64, value: Value) -> Self {
        let payload = match value {
            Value::Null => None,
            other => Some(other),
        };
        Self::with_captured_at(captured_at_millis, payload)
    }

    /// True for a structurally degenerate entry with no usable payload.
    pub fn is_empty(&self) -> bool {
        matches!(self.payload, None | Some(Value::Null))
    }

    /// Decode into a typed envelope. Degenerate entries decode to `None`.
    pub fn decode<T: DeserializeOwned>(
        self,
        key: &str,
    ) -> Result<Option<CacheEnvelope<T>>, StorageError> {
        let captured_at_millis = self.captured_at_millis;
        let served_from_cache = self.served_from_cache;
        match self.payload {
            None | Some(Value::Null) => Ok(None),
            Some(value) => {
                let payload =
                    serde_json::from_value(value).map_err(|e| StorageError::Deserialization {
                        key: key.to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(Some(CacheEnvelope {
                    payload,
                    captured_at_millis,
                    served_from_cache,
                }))
            }
        }
    }
}

impl<T: PartialEq> PartialEq for CacheEnvelope<T> {
    fn eq(&self, other: &Self) -> bool {
        self.captured_at_millis == other.captured_at_millis && self.payload == other.payload
    }
}

impl<T: Eq> Eq for CacheEnvelope<T> {}

impl<T: Hash> Hash for CacheEnvelope<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.captured_at_millis.hash(state);
        self.payload.hash(state);
    }
}

impl<T> AsRef<T> for CacheEnvelope<T> {
    fn as_ref(&self) -> &T {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    const ONE_HOUR_MS: i64 = 3_600_000;

    #[test]
    fn test_new_is_not_from_cache() {
        let envelope = CacheEnvelope::new("fresh");
        assert!(!envelope.is_served_from_cache());
        assert!(envelope.staleness() < Duration::from_secs(5));
    }

    #[test]
    fn test_equality_ignores_cache_flag() {
        let a = CacheEnvelope::with_captured_at(42, "x");
        let b = CacheEnvelope::with_captured_at(42, "x").mark_served_from_cache();
        assert_eq!(a, b);
        assert_ne!(a, CacheEnvelope::with_captured_at(43, "x"));
        assert_ne!(a, CacheEnvelope::with_captured_at(42, "y"));
    }

    #[test]
    fn test_one_hour_old_is_invalid_for_sixty_seconds() {
        let now = now_millis();
        let envelope = CacheEnvelope::with_captured_at(now - ONE_HOUR_MS, "stale");
        assert!(!envelope.is_valid_at(now, Ttl::seconds(60), false));
        assert!(envelope.is_valid_at(now, Ttl::seconds(60), true));
        assert!(envelope.is_valid_at(now, Ttl::hours(2), false));
    }

    #[test]
    fn test_validity_boundary_is_exclusive() {
        let envelope = CacheEnvelope::with_captured_at(1_000, ());
        assert!(envelope.is_valid_at(1_999, Ttl::millis(1_000), false));
        assert!(!envelope.is_valid_at(2_000, Ttl::millis(1_000), false));
    }

    #[test]
    fn test_stored_round_trip() {
        let envelope = CacheEnvelope::with_captured_at(7, vec![1, 2, 3]);
        let stored = envelope.to_stored().expect("serialize should succeed");
        assert!(!stored.is_empty());
        let decoded: CacheEnvelope<Vec<i32>> = stored
            .decode("k")
            .expect("decode should succeed")
            .expect("payload should be present");
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_null_payload_is_empty() {
        let stored = CacheEnvelope::with_captured_at(7, None::<String>)
            .to_stored()
            .expect("serialize should succeed");
        assert!(stored.is_empty());
        assert!(stored.decode::<String>("k").expect("decode ok").is_none());

        let explicit_null = StoredEnvelope::with_captured_at(7, Some(Value::Null));
        assert!(explicit_null.is_empty());
    }

    #[test]
    fn test_decode_type_mismatch_is_error() {
        let stored = StoredEnvelope::from_value(7, json!({"name": "x"}));
        let err = stored.decode::<u32>("global_k").unwrap_err();
        assert!(matches!(err, StorageError::Deserialization { ref key, .. } if key == "global_k"));
    }

    #[test]
    fn test_cache_flag_is_not_serialized() {
        let envelope = CacheEnvelope::with_captured_at(7, "x").mark_served_from_cache();
        let json = serde_json::to_value(&envelope).expect("serialize should succeed");
        assert!(json.get("served_from_cache").is_none());
        let back: CacheEnvelope<String> = serde_json::from_value(json).expect("deserialize");
        assert!(!back.is_served_from_cache());
    }

    #[test]
    fn test_map_keeps_metadata() {
        let envelope = CacheEnvelope::with_captured_at(9, 21).mark_served_from_cache();
        let mapped = envelope.map(|v| v * 2);
        assert_eq!(*mapped.payload(), 42);
        assert_eq!(mapped.captured_at_millis(), 9);
        assert!(mapped.is_served_from_cache());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// valid == (age < ttl) || keep_expired
        #[test]
        fn prop_ttl_validity(age in 0i64..10_000_000, ttl_ms in 0u64..10_000_000, keep in any::<bool>()) {
            let now = 1_700_000_000_000i64;
            let envelope = CacheEnvelope::with_captured_at(now - age, ());
            let expected = keep || age < ttl_ms as i64;
            prop_assert_eq!(envelope.is_valid_at(now, Ttl::millis(ttl_ms), keep), expected);
        }
    }
}
