//! # Ticketing Core
//!
//! Domain types and seams for the ticketing booking engine.
//!
//! This crate holds everything the engine needs that performs no I/O:
//!
//! - **Types**: events, bookings, money, capacity, quantities and the joint booking state
//! - **Transition**: the pure `(State, Command, Environment) → Result<State, Error>` trait
//!   used for lifecycle rules
//! - **Environment**: injected dependencies such as [`environment::Clock`]
//! - **Gateway**: the collaborator traits ([`gateway::EventCatalog`],
//!   [`gateway::PersistenceGateway`], [`gateway::UnitOfWork`]) implemented by the
//!   `PostgreSQL` store and the in-memory test store
//! - **Pagination**: 1-indexed page requests and result pages
//!
//! ## Architecture Principles
//!
//! - Functional core, imperative shell: rules are pure functions, storage is injected
//! - Inventory is derived from booking rows, never stored as a separate counter
//! - Every mutating operation runs inside one [`gateway::UnitOfWork`]
//!
//! ## Example
//!
//! ```ignore
//! use ticketing_core::gateway::{EventCatalog, PersistenceGateway};
//!
//! async fn seats_held(
//!     store: &dyn PersistenceGateway,
//!     event_id: EventId,
//! ) -> Result<u32, StoreError> {
//!     let mut uow = store.begin().await?;
//!     let bookings = uow.read_bookings_for_event(event_id).await?;
//!     uow.rollback().await?;
//!     Ok(bookings.iter().filter(|b| b.state.holds_seats()).map(|b| b.quantity.value()).sum())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod gateway;
pub mod pagination;
pub mod transition;
pub mod types;

pub use gateway::{EventCatalog, EventSales, PersistenceGateway, StoreError, UnitOfWork};
pub use pagination::{Page, PageRequest};
pub use transition::Transition;
pub use types::*;

/// Environment module - Dependency injection traits
///
/// All time-dependent rules read the current instant through [`Clock`](environment::Clock)
/// so tests can pin or advance time deterministically.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Production - uses system clock
    /// struct SystemClock;
    /// impl Clock for SystemClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         Utc::now()
    ///     }
    /// }
    ///
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time from the operating system.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
