//! Time-to-live configuration for cached envelopes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Unit of a [`Ttl`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Number of milliseconds in one unit.
    pub fn millis_per_unit(self) -> u64 {
        match self {
            Self::Milliseconds => 1,
            Self::Seconds => 1_000,
            Self::Minutes => 60_000,
            Self::Hours => 3_600_000,
            Self::Days => 86_400_000,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Milliseconds => "MILLISECONDS",
            Self::Seconds => "SECONDS",
            Self::Minutes => "MINUTES",
            Self::Hours => "HOURS",
            Self::Days => "DAYS",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A (value, unit) time-to-live. Defaults to 30 minutes.
///
/// The original pair is kept so it can be displayed the way it was
/// configured; comparisons between envelopes and TTLs always go through
/// [`Ttl::as_millis`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ttl {
    value: u64,
    unit: TimeUnit,
}

impl Default for Ttl {
    fn default() -> Self {
        Self::minutes(30)
    }
}

impl Ttl {
    pub fn new(value: u64, unit: TimeUnit) -> Self {
        Self { value, unit }
    }

    pub fn millis(value: u64) -> Self {
        Self::new(value, TimeUnit::Milliseconds)
    }

    pub fn seconds(value: u64) -> Self {
        Self::new(value, TimeUnit::Seconds)
    }

    pub fn minutes(value: u64) -> Self {
        Self::new(value, TimeUnit::Minutes)
    }

    pub fn hours(value: u64) -> Self {
        Self::new(value, TimeUnit::Hours)
    }

    pub fn days(value: u64) -> Self {
        Self::new(value, TimeUnit::Days)
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// TTL in milliseconds, saturating at `i64::MAX`.
    pub fn as_millis(&self) -> i64 {
        let millis = self.value.saturating_mul(self.unit.millis_per_unit());
        i64::try_from(millis).unwrap_or(i64::MAX)
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.value.saturating_mul(self.unit.millis_per_unit()))
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        Self::millis(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_is_thirty_minutes() {
        let ttl = Ttl::default();
        assert_eq!(ttl.value(), 30);
        assert_eq!(ttl.unit(), TimeUnit::Minutes);
        assert_eq!(ttl.as_millis(), 1_800_000);
    }

    #[test]
    fn test_display() {
        assert_eq!(Ttl::default().to_string(), "30 MINUTES");
        assert_eq!(Ttl::seconds(60).to_string(), "60 SECONDS");
    }

    #[test]
    fn test_saturates_instead_of_overflowing() {
        assert_eq!(Ttl::days(u64::MAX).as_millis(), i64::MAX);
    }

    #[test]
    fn test_from_duration() {
        let ttl = Ttl::from(Duration::from_secs(90));
        assert_eq!(ttl.as_millis(), 90_000);
        assert_eq!(ttl.as_duration(), Duration::from_secs(90));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Converting between units never changes the represented span.
        #[test]
        fn prop_units_agree(minutes in 0u64..1_000_000) {
            prop_assert_eq!(Ttl::minutes(minutes).as_millis(), Ttl::seconds(minutes * 60).as_millis());
            prop_assert_eq!(Ttl::hours(minutes).as_millis(), Ttl::minutes(minutes * 60).as_millis());
        }
    }
}
