//! # Ticketing Testing
//!
//! Testing utilities and helpers for the ticketing booking engine.
//!
//! This crate provides:
//! - Clock doubles ([`FixedClock`], [`ManualClock`])
//! - [`InMemoryStore`]: an [`EventCatalog`](ticketing_core::EventCatalog) +
//!   [`PersistenceGateway`](ticketing_core::PersistenceGateway) with real atomic units
//!   of work and conflict injection
//! - [`TransitionTest`]: Given-When-Then assertions for [`Transition`](ticketing_core::Transition)
//!   implementations
//! - Event fixtures
//!
//! ## Example
//!
//! ```ignore
//! use ticketing_testing::{fixtures, test_clock, InMemoryStore};
//!
//! #[tokio::test]
//! async fn test_purchase() {
//!     let store = InMemoryStore::new();
//!     let event = fixtures::upcoming_event(&test_clock(), 10);
//!     store.seed_event(event.clone()).await;
//!
//!     let service = BookingService::new(store.catalog(), store.gateway(), Arc::new(test_clock()));
//!     let booking = service.purchase(UserId::new(), event.id, 2).await.unwrap();
//!     assert_eq!(booking.state, BookingState::Reserved);
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};
use ticketing_core::environment::Clock;

pub mod fixtures;
pub mod store;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Arc, Clock, DateTime, Duration, Mutex, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use ticketing_testing::mocks::FixedClock;
    /// use ticketing_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when a test tells it to.
    ///
    /// Clones share the same instant, so a test can hand one clone to a service and
    /// advance the other.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a manual clock starting at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward by `by`
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an absolute instant
        pub fn set(&self, to: DateTime<Utc>) {
            let mut time = self.time.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            *time = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
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

/// Install a test-friendly `tracing` subscriber (idempotent).
///
/// Honors `RUST_LOG`; output goes through the test harness capture.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, test_clock};
pub use store::InMemoryStore;
pub use transition_test::TransitionTest;

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
    fn test_manual_clock_shares_time_between_clones() {
        let clock = ManualClock::new(test_clock().now());
        let handle = clock.clone();
        handle.advance(Duration::hours(2));
        assert_eq!(clock.now(), test_clock().now() + Duration::hours(2));
    }
}
