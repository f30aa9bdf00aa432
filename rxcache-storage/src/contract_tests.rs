//! Behavior every [`Storage`] backend must share.
//!
//! Each backend's test module calls these checks against a fresh instance.

use rxcache_core::{now_millis, StoredEnvelope};
use serde_json::{json, Value};

use crate::Storage;

fn envelope(captured_at: i64, value: &str) -> StoredEnvelope {
    StoredEnvelope::from_value(captured_at, Value::from(value))
}

/// Three global entries and three entries in `session1`.
fn seed(storage: &dyn Storage, captured_at: i64) {
    let entries = [
        (None, "globalKey", "globalValue"),
        (None, "key1", "globalValue1"),
        (None, "key2", "globalValue2"),
        (Some("session1"), "sessionKey", "session1Value"),
        (Some("session1"), "key1", "session1Value1"),
        (Some("session1"), "key2", "session1Value2"),
    ];
    for (session, key, value) in entries {
        storage
            .put(session, key, Some(&envelope(captured_at, value)))
            .expect("seed put should succeed");
    }
}

pub(crate) fn check_put_get(storage: &dyn Storage) {
    let cached_at = now_millis();
    seed(storage, cached_at);

    for (session, key) in [
        (None, ""),
        (None, "unknownKey"),
        (None, "sessionKey"),
        (Some("unknownSession"), ""),
        (Some("unknownSession"), "unknownKey"),
        (Some("unknownSession"), "sessionKey"),
        (Some("session1"), ""),
        (Some("session1"), "unknownKey"),
        (Some("session1"), "globalKey"),
    ] {
        assert_eq!(
            storage.get(session, key).expect("get should succeed"),
            None,
            "{session:?}/{key} should be absent"
        );
    }

    for (session, key, value) in [
        (None, "globalKey", "globalValue"),
        (None, "key1", "globalValue1"),
        (None, "key2", "globalValue2"),
        (Some("session1"), "sessionKey", "session1Value"),
        (Some("session1"), "key1", "session1Value1"),
        (Some("session1"), "key2", "session1Value2"),
    ] {
        assert_eq!(
            storage.get(session, key).expect("get should succeed"),
            Some(envelope(cached_at, value))
        );
    }

    // Empty session is the global namespace.
    assert_eq!(
        storage.get(Some(""), "globalKey").expect("get should succeed"),
        Some(envelope(cached_at, "globalValue"))
    );
}

pub(crate) fn check_count(storage: &dyn Storage) {
    seed(storage, now_millis());

    assert_eq!(storage.count().expect("count"), 6);

    assert_eq!(storage.count_sessions(&[""]).expect("count"), 3);
    assert_eq!(storage.count_sessions(&["unknownSession"]).expect("count"), 0);
    assert_eq!(
        storage
            .count_sessions(&["unknownSession", "session1"])
            .expect("count"),
        3
    );

    assert_eq!(storage.count_prefix(Some(""), "").expect("count"), 3);
    assert_eq!(storage.count_prefix(None, "").expect("count"), 3);
    assert_eq!(storage.count_prefix(Some("unknownSession"), "unknownKey").expect("count"), 0);
    assert_eq!(storage.count_prefix(Some("unknownSession"), "key1").expect("count"), 0);
    assert_eq!(storage.count_prefix(Some("session1"), "").expect("count"), 3);
    assert_eq!(storage.count_prefix(Some("session1"), "ke").expect("count"), 2);
    assert_eq!(storage.count_prefix(Some("session1"), "unknownKey").expect("count"), 0);
}

pub(crate) fn check_clear(storage: &dyn Storage) {
    seed(storage, now_millis());
    storage.clear().expect("clear should succeed");
    assert_eq!(storage.count().expect("count"), 0);
}

pub(crate) fn check_clear_sessions(storage: &dyn Storage) {
    seed(storage, now_millis());
    storage
        .clear_sessions(&["unknownSession", "session1"])
        .expect("clear should succeed");
    assert_eq!(storage.count().expect("count"), 3);
    assert!(storage.exists(None, "globalKey").expect("exists"));
    assert!(!storage.exists(Some("session1"), "sessionKey").expect("exists"));
}

pub(crate) fn check_clear_prefix(storage: &dyn Storage) {
    seed(storage, now_millis());
    storage.clear_prefix(None, "ke").expect("clear should succeed");
    storage
        .clear_prefix(Some("session1"), "ke")
        .expect("clear should succeed");
    assert_eq!(storage.count().expect("count"), 2);
    assert!(storage.exists(None, "globalKey").expect("exists"));
    assert!(storage.exists(Some("session1"), "sessionKey").expect("exists"));
}

pub(crate) fn check_valueless_put(storage: &dyn Storage) {
    storage.put(None, "nothing", None).expect("put should succeed");
    assert!(storage.exists(None, "nothing").expect("exists"));
    assert_eq!(storage.get(None, "nothing").expect("get"), None);
    assert_eq!(storage.count().expect("count"), 1);
}

pub(crate) fn check_overwrite_and_delete(storage: &dyn Storage) {
    let first = StoredEnvelope::from_value(1, json!({"v": 1}));
    let second = StoredEnvelope::from_value(2, json!({"v": 2}));

    storage.put(Some("s"), "k", Some(&first)).expect("put");
    storage.put(Some("s"), "k", Some(&second)).expect("put");
    assert_eq!(storage.get(Some("s"), "k").expect("get"), Some(second));
    assert_eq!(storage.count().expect("count"), 1);

    storage.delete(Some("s"), "k").expect("delete");
    assert_eq!(storage.get(Some("s"), "k").expect("get"), None);
    assert!(!storage.exists(Some("s"), "k").expect("exists"));

    // Deleting a missing entry is a no-op.
    storage.delete(Some("s"), "k").expect("delete of missing entry");
}

pub(crate) fn check_get_or_default(storage: &dyn Storage) {
    let stored = envelope(5, "stored");
    storage.put(None, "present", Some(&stored)).expect("put");

    let hit = storage
        .get_or_default(None, "present", Value::from("fallback"))
        .expect("get_or_default");
    assert_eq!(hit, stored);

    let miss = storage
        .get_or_default(None, "absent", Value::from("fallback"))
        .expect("get_or_default");
    assert_eq!(miss.payload(), &Some(Value::from("fallback")));
    assert!(miss.captured_at_millis() > 0);
}
