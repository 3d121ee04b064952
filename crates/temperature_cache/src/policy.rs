//! Staleness policy.
//!
//! Freshness is never stored; it is computed on read from `observed_at`.

use chrono::{DateTime, Duration, Utc};

const DEFAULT_MAX_AGE_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    max_age: Duration,
}

impl StalenessPolicy {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }

    pub fn from_secs(secs: u64) -> Self {
        let secs = i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1_000);
        Self::new(Duration::seconds(secs))
    }

    /// Stale once the elapsed time strictly exceeds `max_age`. A record
    /// observed "in the future" (clock skew) counts as fresh.
    pub fn is_stale(&self, observed_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(observed_at) > self.max_age
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_MAX_AGE_SECS))
    }
}
