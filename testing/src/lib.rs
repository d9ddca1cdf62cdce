//! # Arena Testing
//!
//! Testing utilities for the Arena tournament ledger.
//!
//! This crate provides:
//! - [`InMemoryCollectionStore`]: `HashMap`-backed collection store with
//!   optional latency and save counters
//! - [`FlakyCollectionStore`]: wraps the in-memory store and fails a chosen
//!   number of loads or saves per collection
//! - Deterministic environment mocks: [`FixedClock`], [`SequentialIdGenerator`]
//!
//! ## Example
//!
//! ```
//! use arena_core::CollectionStore;
//! use arena_core::collection::CollectionName;
//! use arena_testing::InMemoryCollectionStore;
//!
//! # async fn example() -> Result<(), arena_core::StoreError> {
//! let store = InMemoryCollectionStore::new();
//! store.save(&CollectionName::USERS, vec![serde_json::json!({"id": "u-1"})]).await?;
//! assert_eq!(store.load(&CollectionName::USERS).await?.len(), 1);
//! # Ok(())
//! # }
//! ```

use arena_core::environment::{Clock, IdGenerator};
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

pub mod store_mocks;

pub use store_mocks::{FlakyCollectionStore, InMemoryCollectionStore};

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Arc, Clock, DateTime, Duration, PoisonError, RwLock, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Returns the same time until explicitly advanced. Clones share the
    /// same time.
    ///
    /// # Example
    ///
    /// ```
    /// use arena_testing::mocks::FixedClock;
    /// use arena_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// assert_eq!(time1, clock.now());
    ///
    /// clock.advance(Duration::seconds(5));
    /// assert_eq!(clock.now() - time1, Duration::seconds(5));
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Move the clock forward.
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.write().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Predictable ids: `txn-1`, `txn-2`, `enr-3`, ...
///
/// The counter is shared across prefixes.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    /// Create a generator starting at 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self, prefix: &str) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{prefix}-{n}")
    }
}

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; output is captured by the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

pub use mocks::{FixedClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn cloned_clocks_advance_together() {
        let clock = test_clock();
        let shared = clock.clone();
        clock.advance(Duration::minutes(1));
        assert_eq!(shared.now(), clock.now());
    }

    #[test]
    fn sequential_ids_count_up() {
        let ids = SequentialIdGenerator::new();
        assert_eq!(ids.next_id("txn"), "txn-1");
        assert_eq!(ids.next_id("enr"), "enr-2");
    }
}
