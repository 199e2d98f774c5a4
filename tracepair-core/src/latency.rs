//! Simulated Latency
//!
//! Sleep-based delays so traces show realistic spans. Disabled in tests.

use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;

use crate::constants::{
    LATENCY_LIST_MS_MAX, LATENCY_LIST_MS_MIN, LATENCY_POINT_MS_MAX, LATENCY_POINT_MS_MIN,
    LATENCY_UPSTREAM_LIST_MS_MAX, LATENCY_UPSTREAM_LIST_MS_MIN, LATENCY_UPSTREAM_POINT_MS_MAX,
    LATENCY_UPSTREAM_POINT_MS_MIN,
};

/// Operation being delayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Enumerate records
    List,
    /// Single-record read
    Get,
    /// Single-record write
    Create,
    /// Single-record removal
    Delete,
}

/// Delay ranges per operation, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencyProfile {
    list_ms: Option<RangeInclusive<u64>>,
    get_ms: Option<RangeInclusive<u64>>,
    create_ms: Option<RangeInclusive<u64>>,
    delete_ms: Option<RangeInclusive<u64>>,
}

impl LatencyProfile {
    /// No delays.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            list_ms: None,
            get_ms: None,
            create_ms: None,
            delete_ms: None,
        }
    }

    /// Database service profile: list 100–400ms, everything else 50–200ms.
    #[must_use]
    pub fn downstream() -> Self {
        let point = LATENCY_POINT_MS_MIN..=LATENCY_POINT_MS_MAX;
        Self {
            list_ms: Some(LATENCY_LIST_MS_MIN..=LATENCY_LIST_MS_MAX),
            get_ms: Some(point.clone()),
            create_ms: Some(point.clone()),
            delete_ms: Some(point),
        }
    }

    /// Api service profile: list 100–300ms, create 50–200ms, get/delete 50–150ms.
    #[must_use]
    pub fn upstream() -> Self {
        let point = LATENCY_UPSTREAM_POINT_MS_MIN..=LATENCY_UPSTREAM_POINT_MS_MAX;
        Self {
            list_ms: Some(LATENCY_UPSTREAM_LIST_MS_MIN..=LATENCY_UPSTREAM_LIST_MS_MAX),
            get_ms: Some(point.clone()),
            create_ms: Some(LATENCY_POINT_MS_MIN..=LATENCY_POINT_MS_MAX),
            delete_ms: Some(point),
        }
    }

    /// Pick `profile` when enabled, otherwise no delays.
    #[must_use]
    pub fn enabled_or_disabled(enabled: bool, profile: Self) -> Self {
        if enabled {
            profile
        } else {
            Self::disabled()
        }
    }

    /// True when every operation is instant.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        *self == Self::disabled()
    }

    /// Draw a delay for `operation`.
    #[must_use]
    pub fn sample(&self, operation: Operation) -> Duration {
        let range = match operation {
            Operation::List => &self.list_ms,
            Operation::Get => &self.get_ms,
            Operation::Create => &self.create_ms,
            Operation::Delete => &self.delete_ms,
        };
        match range {
            Some(range) => Duration::from_millis(rand::thread_rng().gen_range(range.clone())),
            None => Duration::ZERO,
        }
    }

    /// Sleep for a sampled delay.
    pub async fn pause(&self, operation: Operation) {
        let delay = self.sample(operation);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for LatencyProfile {
    fn default() -> Self {
        Self::downstream()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_is_zero() {
        let profile = LatencyProfile::disabled();
        assert!(profile.is_disabled());
        assert_eq!(profile.sample(Operation::List), Duration::ZERO);
    }

    #[test]
    fn test_downstream_ranges() {
        let profile = LatencyProfile::downstream();
        for _ in 0..200 {
            let list = profile.sample(Operation::List).as_millis();
            assert!((100..=400).contains(&list), "list delay {list}ms out of range");

            let get = profile.sample(Operation::Get).as_millis();
            assert!((50..=200).contains(&get), "get delay {get}ms out of range");
        }
    }

    #[test]
    fn test_upstream_ranges() {
        let profile = LatencyProfile::upstream();
        for _ in 0..200 {
            let delete = profile.sample(Operation::Delete).as_millis();
            assert!((50..=150).contains(&delete), "delete delay {delete}ms out of range");
        }
    }

    #[test]
    fn test_enabled_or_disabled() {
        let profile = LatencyProfile::enabled_or_disabled(false, LatencyProfile::upstream());
        assert!(profile.is_disabled());
        assert_eq!(
            LatencyProfile::enabled_or_disabled(true, LatencyProfile::upstream()),
            LatencyProfile::upstream()
        );
    }
}
