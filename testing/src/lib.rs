//! # Todo Store Testing
//!
//! Testing utilities and helpers for the todo store.
//!
//! This crate provides:
//! - Deterministic `Clock` implementations
//! - A Given-When-Then harness for reducers
//! - Assertion helpers for returned effects
//!
//! ## Example
//!
//! ```ignore
//! use todo_store_testing::{ReducerTest, ManualClock, assertions};
//!
//! ReducerTest::new(TodoReducer::new())
//!     .with_env(env)
//!     .given_state(TodoState::new())
//!     .when_action(TodoAction::command(1, Msg::AddTodo("Buy milk".into())))
//!     .then_state(|state| assert_eq!(state.todos().len(), 1))
//!     .then_effects(assertions::assert_no_delay_effect)
//!     .run();
//! ```

use chrono::{DateTime, TimeZone, Utc};
use todo_store_core::environment::Clock;


pub use reducer_test::{assertions, ReducerTest};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, TimeZone, Utc};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::time::Duration;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use todo_store_testing::mocks::FixedClock;
    /// use todo_store_core::environment::Clock;
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

    /// Clock that only moves when told to
    ///
    /// Clones share the same time, so a test can keep one handle and pass
    /// another into an environment.
    ///
    /// ```
    /// use std::time::Duration;
    /// use todo_store_core::environment::Clock;
    /// use todo_store_testing::mocks::ManualClock;
    ///
    /// let clock = ManualClock::at_millis(1_000);
    /// let shared = clock.clone();
    /// clock.advance(Duration::from_millis(250));
    /// assert_eq!(shared.now_millis(), 1_250);
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        millis: Arc<AtomicI64>,
    }

    impl ManualClock {
        /// Create a clock reading `millis` since the Unix epoch
        #[must_use]
        pub fn at_millis(millis: i64) -> Self {
            Self {
                millis: Arc::new(AtomicI64::new(millis)),
            }
        }

        /// Move the clock forward
        #[allow(clippy::cast_possible_truncation)] // test durations are far below i64::MAX ms
        pub fn advance(&self, by: Duration) {
            self.millis.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
        }

        /// Jump to an absolute time
        pub fn set_millis(&self, millis: i64) {
            self.millis.store(millis, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.timestamp_millis_opt(self.now_millis())
                .single()
                .unwrap_or_default()
        }

        fn now_millis(&self) -> i64 {
            self.millis.load(Ordering::SeqCst)
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

// Re-export commonly used items
pub use mocks::{test_clock, FixedClock, ManualClock};
