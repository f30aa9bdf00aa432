//! Session-scoped storage keys.
//!
//! A key lives either in a named session or in the reserved global namespace
//! (no session, or an empty session name). Backends store entries under the
//! composed form returned by [`StorageKey::compose`].
//!
//! Composition is plain concatenation: `"{session}_{key}"` or
//! `"global_{key}"`. The separator is not escaped, so session `"a"` with key
//! `"b_c"` and session `"a_b"` with key `"c"` compose to the same string, as
//! do session `"global"` and the global namespace. Prefix operations on a
//! session therefore also match sessions that extend its name with `_`.

use std::fmt;

/// Separator between the namespace and the raw key.
pub const SEPARATOR: char = '_';

/// Namespace used when no session is given.
pub const GLOBAL_NAMESPACE: &str = "global";

/// A `(session, key)` pair addressing one entry in storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    session: Option<String>,
    key: String,
}

impl StorageKey {
    /// Create a key. An empty session is normalized to the global namespace.
    pub fn new(session: Option<&str>, key: impl Into<String>) -> Self {
        Self {
            session: session.filter(|s| !s.is_empty()).map(str::to_string),
            key: key.into(),
        }
    }

    /// A key in the global namespace.
    pub fn global(key: impl Into<String>) -> Self {
        Self::new(None, key)
    }

    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_global(&self) -> bool {
        self.session.is_none()
    }

    /// The flat key backends store the entry under.
    pub fn compose(&self) -> String {
        Self::compose_parts(self.session(), &self.key)
    }

    /// Prefix matching every entry of `session` whose raw key starts with
    /// `key_prefix`. An empty prefix addresses the whole session.
    pub fn namespace_prefix(session: Option<&str>, key_prefix: &str) -> String {
        Self::compose_parts(session, key_prefix)
    }

    fn compose_parts(session: Option<&str>, key: &str) -> String {
        match session.filter(|s| !s.is_empty()) {
            Some(session) => format!("{session}{SEPARATOR}{key}"),
            None => format!("{GLOBAL_NAMESPACE}{SEPARATOR}{key}"),
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.compose())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_compose_global_and_session() {
        assert_eq!(StorageKey::global("user").compose(), "global_user");
        assert_eq!(StorageKey::new(Some("alice"), "user").compose(), "alice_user");
    }

    #[test]
    fn test_empty_session_is_global() {
        let key = StorageKey::new(Some(""), "user");
        assert!(key.is_global());
        assert_eq!(key, StorageKey::global("user"));
        assert_eq!(key.compose(), "global_user");
    }

    #[test]
    fn test_namespace_prefix() {
        assert_eq!(StorageKey::namespace_prefix(Some("s1"), ""), "s1_");
        assert_eq!(StorageKey::namespace_prefix(None, "ke"), "global_ke");
        assert!(StorageKey::new(Some("s1"), "key1")
            .compose()
            .starts_with(&StorageKey::namespace_prefix(Some("s1"), "ke")));
    }

    #[test]
    fn test_unescaped_separator_collides() {
        // Current behavior: the separator is not escaped.
        assert_eq!(
            StorageKey::new(Some("a"), "b_c").compose(),
            StorageKey::new(Some("a_b"), "c").compose()
        );
        assert_eq!(
            StorageKey::new(Some("global"), "x").compose(),
            StorageKey::global("x").compose()
        );
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9]{1,12}"
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        /// Within one namespace, composition is injective.
        #[test]
        fn prop_injective_within_session(
            session in proptest::option::of(segment()),
            k1 in "[a-zA-Z0-9_]{0,16}",
            k2 in "[a-zA-Z0-9_]{0,16}",
        ) {
            let a = StorageKey::new(session.as_deref(), k1.clone());
            let b = StorageKey::new(session.as_deref(), k2.clone());
            prop_assert_eq!(a.compose() == b.compose(), k1 == k2);
        }

        /// Sessions without the separator never collide with each other.
        #[test]
        fn prop_distinct_plain_sessions_do_not_collide(
            s1 in segment(),
            s2 in segment(),
            key in "[a-zA-Z0-9]{0,16}",
        ) {
            prop_assume!(s1 != s2);
            let a = StorageKey::new(Some(&s1), key.clone());
            let b = StorageKey::new(Some(&s2), key);
            prop_assert_ne!(a.compose(), b.compose());
        }

        /// Every key of a session matches that session's empty prefix.
        #[test]
        fn prop_key_matches_own_namespace(
            session in proptest::option::of(segment()),
            key in "[a-zA-Z0-9_]{0,16}",
        ) {
            let composed = StorageKey::new(session.as_deref(), key).compose();
            prop_assert!(composed.starts_with(&StorageKey::namespace_prefix(session.as_deref(), "")));
        }
    }
}
