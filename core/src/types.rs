//! Domain types for the booking engine.
//!
//! Value objects, entities and the joint booking state. Inventory is intentionally absent:
//! available seats are always derived from booking rows (see `ticketing::inventory`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a user (the purchaser owning a booking)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random `UserId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `UserId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a booking
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BookingId(Uuid);

impl BookingId {
    /// Creates a new random `BookingId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `BookingId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BookingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money
// ============================================================================

/// An amount in integer cents
///
/// Prices and subtotals never go through floating point; multiplication by a
/// quantity is checked so an absurd order is rejected instead of wrapping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Amount from a number of cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Sum, clamped at the largest representable amount (used for report totals)
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// `self × quantity`, or `None` on overflow
    #[must_use]
    pub const fn checked_multiply(self, quantity: u32) -> Option<Self> {
        if let Some(total) = self.0.checked_mul(quantity as u64) {
            Some(Self(total))
        } else {
            None
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Capacity and Quantity
// ============================================================================

/// Total number of seats an event can hold
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capacity(u32);

impl Capacity {
    /// Creates a new `Capacity`
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the seat count
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rejected quantity input (zero or negative).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("quantity must be a positive integer, got {0}")]
pub struct InvalidQuantity(pub i64);

/// Number of seats requested by a single booking (always ≥ 1)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    /// Creates a `Quantity`, returning `None` for zero
    #[must_use]
    pub const fn new(value: u32) -> Option<Self> {
        if value == 0 { None } else { Some(Self(value)) }
    }

    /// Returns the seat count
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl TryFrom<i64> for Quantity {
    type Error = InvalidQuantity;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u32::try_from(value)
            .ok()
            .and_then(Self::new)
            .ok_or(InvalidQuantity(value))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Events (the things tickets are sold for)
// ============================================================================

/// Lifecycle status of an event, owned by the catalog
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStatus {
    /// Scheduled and open for purchases
    Upcoming,
    /// Currently taking place
    Ongoing,
    /// Finished
    Completed,
}

impl EventStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
        }
    }

    /// Parse status from database string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "upcoming" => Some(Self::Upcoming),
            "ongoing" => Some(Self::Ongoing),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Whether the catalog may move an event from `self` to `next`.
    ///
    /// Statuses only move forward: Upcoming → Ongoing → Completed (skipping allowed).
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        (self as u8) < (next as u8)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event with finite capacity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier
    pub id: EventId,
    /// Display name (unique in the catalog)
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Where it takes place
    pub location: String,
    /// Scheduled start time
    pub starts_at: DateTime<Utc>,
    /// Total seats
    pub capacity: Capacity,
    /// Price per seat
    pub price: Money,
    /// Lifecycle status
    pub status: EventStatus,
    /// When the event was created
    pub created_at: DateTime<Utc>,
    /// When the event was last modified
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Builds a new `Upcoming` event from a draft.
    #[must_use]
    pub fn from_draft(id: EventId, draft: EventDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            description: draft.description,
            location: draft.location,
            starts_at: draft.starts_at,
            capacity: draft.capacity,
            price: draft.price,
            status: EventStatus::Upcoming,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Create/update payload for catalog events
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Where it takes place
    pub location: String,
    /// Scheduled start time
    pub starts_at: DateTime<Utc>,
    /// Total seats
    pub capacity: Capacity,
    /// Price per seat
    pub price: Money,
}

impl EventDraft {
    /// Checks field-level rules.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message when the name or location is blank or capacity
    /// is zero.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Event name must not be empty".to_string());
        }

        if self.location.trim().is_empty() {
            return Err("Event location must not be empty".to_string());
        }

        if self.capacity.value() == 0 {
            return Err("Capacity must be greater than zero".to_string());
        }

        Ok(())
    }
}

// ============================================================================
// Bookings
// ============================================================================

/// Booking status column
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Seats held, awaiting payment
    Reserved,
    /// Paid and held
    Confirmed,
    /// Released
    Cancelled,
}

impl BookingStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reserved => "reserved",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse status from database string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reserved" => Some(Self::Reserved),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Reserved => "Reserved",
            Self::Confirmed => "Confirmed",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(label)
    }
}

/// Payment status column
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Awaiting payment
    Pending,
    /// Payment captured
    Paid,
    /// Payment abandoned or refunded
    PaymentCancelled,
}

impl PaymentStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::PaymentCancelled => "payment_cancelled",
        }
    }

    /// Parse status from database string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "payment_cancelled" => Some(Self::PaymentCancelled),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "Pending",
            Self::Paid => "Paid",
            Self::PaymentCancelled => "PaymentCancelled",
        };
        f.write_str(label)
    }
}

/// The joint (status, payment status) state of a booking.
///
/// Only the three reachable pairs are representable:
///
/// | State | status | payment |
/// |---|---|---|
/// | `Reserved` | Reserved | Pending |
/// | `Confirmed` | Confirmed | Paid |
/// | `Cancelled` | Cancelled | `PaymentCancelled` |
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingState {
    /// Seats held, awaiting payment
    Reserved,
    /// Paid; seats held
    Confirmed,
    /// Terminal; seats released
    Cancelled,
}

impl BookingState {
    /// Status column for this state
    #[must_use]
    pub const fn status(self) -> BookingStatus {
        match self {
            Self::Reserved => BookingStatus::Reserved,
            Self::Confirmed => BookingStatus::Confirmed,
            Self::Cancelled => BookingStatus::Cancelled,
        }
    }

    /// Payment status column for this state
    #[must_use]
    pub const fn payment_status(self) -> PaymentStatus {
        match self {
            Self::Reserved => PaymentStatus::Pending,
            Self::Confirmed => PaymentStatus::Paid,
            Self::Cancelled => PaymentStatus::PaymentCancelled,
        }
    }

    /// Whether a booking in this state counts against event capacity
    #[must_use]
    pub const fn holds_seats(self) -> bool {
        matches!(self, Self::Reserved | Self::Confirmed)
    }

    /// Whether no further transition is possible
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Rebuild the joint state from its two stored columns.
    ///
    /// Returns `None` for pairs outside the transition table.
    #[must_use]
    pub const fn from_parts(status: BookingStatus, payment: PaymentStatus) -> Option<Self> {
        match (status, payment) {
            (BookingStatus::Reserved, PaymentStatus::Pending) => Some(Self::Reserved),
            (BookingStatus::Confirmed, PaymentStatus::Paid) => Some(Self::Confirmed),
            (BookingStatus::Cancelled, PaymentStatus::PaymentCancelled) => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for BookingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.status(), self.payment_status())
    }
}

/// A purchased or pending ticket booking
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking identifier
    pub id: BookingId,
    /// Owning user (immutable)
    pub user_id: UserId,
    /// Booked event (immutable)
    pub event_id: EventId,
    /// Seats in this booking
    pub quantity: Quantity,
    /// Event price at purchase time
    pub unit_price: Money,
    /// `unit_price × quantity`, frozen at purchase time
    pub subtotal: Money,
    /// When the booking was made
    pub booked_at: DateTime<Utc>,
    /// When the state last changed
    pub updated_at: DateTime<Utc>,
    /// Joint lifecycle state
    pub state: BookingState,
}

impl Booking {
    /// Whether `user_id` owns this booking
    #[must_use]
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    /// Seats this booking currently holds (0 once cancelled)
    #[must_use]
    pub const fn seats_held(&self) -> u32 {
        if self.state.holds_seats() {
            self.quantity.value()
        } else {
            0
        }
    }
}
