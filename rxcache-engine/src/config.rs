//! Defaults applied to every request built from an [`RxCache`](crate::RxCache).

use rxcache_core::{ConfigError, Ttl};

use crate::scheduler::Scheduler;

pub const ENV_DEFAULT_SESSION: &str = "RXCACHE_DEFAULT_SESSION";
pub const ENV_DEFAULT_TTL_SECS: &str = "RXCACHE_DEFAULT_TTL_SECS";

/// Per-cache defaults. Individual requests may override each of them.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Session used when a request does not name one. `None` is global.
    pub default_session: Option<String>,
    /// TTL for the default `CACHE_OR_ASYNC` strategy.
    pub default_ttl: Ttl,
    /// Where storage calls run.
    pub default_scheduler: Scheduler,
}

impl CacheConfig {
    pub fn with_default_session(mut self, session: impl Into<String>) -> Self {
        let session = session.into();
        self.default_session = (!session.is_empty()).then_some(session);
        self
    }

    pub fn with_default_ttl(mut self, ttl: Ttl) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_default_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.default_scheduler = scheduler;
        self
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `RXCACHE_DEFAULT_SESSION`: default session (default: global)
    /// - `RXCACHE_DEFAULT_TTL_SECS`: default TTL in seconds (default: 30 minutes)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            default_session: session_from_env(),
            default_ttl: std::env::var(ENV_DEFAULT_TTL_SECS)
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .map(Ttl::seconds)
                .unwrap_or(defaults.default_ttl),
            default_scheduler: defaults.default_scheduler,
        }
    }

    /// Like [`CacheConfig::from_env`], but reports unparsable values.
    pub fn try_from_env() -> Result<Self, ConfigError> {
        let mut config = Self {
            default_session: session_from_env(),
            ..Self::default()
        };

        if let Ok(raw) = std::env::var(ENV_DEFAULT_TTL_SECS) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue {
                    field: ENV_DEFAULT_TTL_SECS.to_string(),
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
            config.default_ttl = Ttl::seconds(secs);
        }

        Ok(config)
    }
}

fn session_from_env() -> Option<String> {
    std::env::var(ENV_DEFAULT_SESSION)
        .ok()
        .filter(|s| !s.is_empty())
}
