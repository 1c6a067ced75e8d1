//! Collaborator traits for the booking engine.
//!
//! The engine never talks to a database directly. It is handed two collaborators at
//! construction time:
//!
//! - [`EventCatalog`]: read access to event metadata (capacity, schedule, lifecycle status)
//! - [`PersistenceGateway`]: durable storage whose writes are grouped into a
//!   [`UnitOfWork`] that commits or rolls back as one unit
//!
//! # Implementations
//!
//! - `PostgresStore` (in `ticketing-postgres`): production, row locks + optional
//!   `SERIALIZABLE` isolation
//! - `InMemoryStore` (in `ticketing-testing`): fast, deterministic, fully serialized
//!
//! # Dyn Compatibility
//!
//! The traits use `async_trait` so they can be held as `Arc<dyn …>` by services.

use crate::pagination::PageRequest;
use crate::types::{Booking, BookingId, BookingState, Event, EventId, Money, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by storage collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Concurrent-write contention (serialization failure, deadlock, lock timeout).
    ///
    /// The unit of work was rolled back and the whole operation may be retried.
    #[error("Concurrent write conflict: {0}")]
    Conflict(String),

    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(String),

    /// A uniqueness constraint rejected the write (e.g. duplicate event name).
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// A stored row violates a domain invariant (unknown status, illegal state pair).
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Whether retrying the whole unit of work can succeed
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Per-event booking aggregates used by sales reports.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSales {
    /// Event these figures belong to
    pub event_id: EventId,
    /// Booking rows of any state
    pub bookings: u64,
    /// Σ quantity of `Reserved` bookings
    pub reserved_seats: u64,
    /// Σ quantity of `Confirmed` bookings
    pub confirmed_seats: u64,
    /// Σ subtotal of `Confirmed` bookings
    pub confirmed_revenue: Money,
}

/// Read access to event metadata.
#[async_trait]
pub trait EventCatalog: Send + Sync {
    /// Load one event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the lookup fails. A missing event is `Ok(None)`.
    async fn get_event(&self, id: EventId) -> Result<Option<Event>, StoreError>;

    /// List events ordered by start time, optionally filtered by a case-insensitive
    /// substring of name, description or location. Returns the page and the total
    /// match count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    async fn list_events(
        &self,
        page: PageRequest,
        search: Option<&str>,
    ) -> Result<(Vec<Event>, u64), StoreError>;

    /// Every event, ordered by start time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    async fn all_events(&self) -> Result<Vec<Event>, StoreError>;
}

/// Durable storage for bookings (and catalog writes) with transactional units of work.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Open a new unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a transaction cannot be started.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    /// Load one booking outside of any unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the lookup fails.
    async fn find_booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError>;

    /// Bookings owned by `user_id`, newest first, plus the total count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    async fn list_bookings_for_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<(Vec<Booking>, u64), StoreError>;

    /// All bookings, newest first, plus the total count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    async fn list_bookings(&self, page: PageRequest) -> Result<(Vec<Booking>, u64), StoreError>;

    /// Booking aggregates grouped by event (events without bookings are omitted).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    async fn sales_by_event(&self) -> Result<Vec<EventSales>, StoreError>;
}

/// One atomic unit of work.
///
/// Every read and write goes through the same transaction. Nothing is visible to other
/// units of work until [`commit`](Self::commit); dropping the unit of work without
/// committing discards every write.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Read the live event row and hold it exclusively until the unit of work ends.
    ///
    /// Every writer of an event's inventory (purchases, capacity changes) takes this lock
    /// first, so "check availability then insert" cannot interleave with another writer.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on lock contention the store gives up on.
    async fn lock_event(&mut self, id: EventId) -> Result<Option<Event>, StoreError>;

    /// All bookings for an event, of any state, as seen by this unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    async fn read_bookings_for_event(&mut self, event_id: EventId) -> Result<Vec<Booking>, StoreError>;

    /// Read a booking and hold it exclusively until the unit of work ends.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on lock contention the store gives up on.
    async fn lock_booking(&mut self, id: BookingId) -> Result<Option<Booking>, StoreError>;

    /// Insert a new booking row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the insert fails.
    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), StoreError>;

    /// Overwrite a booking's joint state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails or the booking does not exist.
    async fn update_booking_state(
        &mut self,
        id: BookingId,
        state: BookingState,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Insert a new event row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the insert fails.
    async fn insert_event(&mut self, event: &Event) -> Result<(), StoreError>;

    /// Overwrite an existing event row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails or the event does not exist.
    async fn update_event(&mut self, event: &Event) -> Result<(), StoreError>;

    /// Delete an event row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the delete fails.
    async fn delete_event(&mut self, id: EventId) -> Result<(), StoreError>;

    /// Make every write of this unit of work visible atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the store aborted the transaction at commit.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard every write of this unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the rollback itself fails.
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
