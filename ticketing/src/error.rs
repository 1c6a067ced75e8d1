//! Error taxonomy for the booking engine.
//!
//! Every operation returns [`TicketingError`]. Business-rule violations are terminal;
//! only [`TicketingError::TransientConflict`] is worth retrying. Raw store errors are
//! never surfaced: they are classified into `TransientConflict` or the opaque
//! [`TicketingError::Store`].

use crate::lifecycle::LifecycleCommand;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use ticketing_core::{BookingId, BookingState, EventId, EventStatus, StoreError, UserId};

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, TicketingError>;

/// Errors returned by the booking engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TicketingError {
    /// The event does not exist.
    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    /// The booking does not exist.
    #[error("Booking not found: {0}")]
    BookingNotFound(BookingId),

    /// The caller does not own the booking.
    #[error("User {user_id} does not own booking {booking_id}")]
    Forbidden {
        /// Caller
        user_id: UserId,
        /// Booking they tried to touch
        booking_id: BookingId,
    },

    /// Quantity is not a positive integer, or exceeds what the event could ever hold.
    #[error("Invalid quantity {requested}: must be between 1 and the event capacity")]
    InvalidQuantity {
        /// Quantity as supplied by the caller
        requested: i64,
    },

    /// Not enough seats left.
    #[error("Insufficient inventory for event {event_id}: requested {requested}, available {available}")]
    InsufficientInventory {
        /// Event
        event_id: EventId,
        /// Seats requested
        requested: u32,
        /// Seats left when the request was evaluated
        available: u32,
    },

    /// Purchases and edits are only accepted while the event is `Upcoming`.
    #[error("Event {event_id} is {status}, not upcoming")]
    EventNotUpcoming {
        /// Event
        event_id: EventId,
        /// Its current status
        status: EventStatus,
    },

    /// The event's scheduled start has been reached.
    #[error("Event {event_id} already started at {starts_at}")]
    EventAlreadyStarted {
        /// Event
        event_id: EventId,
        /// Scheduled start
        starts_at: DateTime<Utc>,
    },

    /// The command is not allowed from the booking's current state.
    #[error("Cannot {command} booking {booking_id} in state {from}")]
    IllegalTransition {
        /// Booking
        booking_id: BookingId,
        /// State the booking was in
        from: BookingState,
        /// Rejected command
        command: LifecycleCommand,
    },

    /// Concurrent-write contention; the whole operation may be retried.
    #[error("Transient conflict, retry the operation: {0}")]
    TransientConflict(String),

    /// Page or page size out of range.
    #[error("Invalid pagination: page {page}, page size {page_size} (page >= 1, 1 <= page size <= {max_page_size})")]
    InvalidPagination {
        /// Requested page
        page: i64,
        /// Requested page size
        page_size: i64,
        /// Largest accepted page size
        max_page_size: u32,
    },

    /// Event payload or status change rejected by catalog rules.
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// Capacity change would leave fewer seats than are currently held.
    #[error("Capacity {capacity} for event {event_id} is below the {held} seats currently held")]
    CapacityBelowHeld {
        /// Event
        event_id: EventId,
        /// Requested capacity
        capacity: u32,
        /// Seats held by Reserved + Confirmed bookings
        held: u32,
    },

    /// Events with booking history cannot be deleted.
    #[error("Event {0} has bookings and cannot be deleted")]
    EventHasBookings(EventId),

    /// Non-retryable infrastructure failure.
    #[error("Storage failure: {0}")]
    Store(String),
}

/// Outward category of a [`TicketingError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Event or booking absent
    NotFound,
    /// Ownership violation
    Forbidden,
    /// Quantity out of range
    InvalidQuantity,
    /// Not enough seats
    InsufficientInventory,
    /// Event not open for purchase
    EventNotUpcoming,
    /// Event already started
    EventAlreadyStarted,
    /// State machine rejected the command
    IllegalTransition,
    /// Safe to retry
    TransientConflict,
    /// Malformed input
    Validation,
    /// Catalog state forbids the change
    Conflict,
    /// Infrastructure failure
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Forbidden => "FORBIDDEN",
            Self::InvalidQuantity => "INVALID_QUANTITY",
            Self::InsufficientInventory => "INSUFFICIENT_INVENTORY",
            Self::EventNotUpcoming => "EVENT_NOT_UPCOMING",
            Self::EventAlreadyStarted => "EVENT_ALREADY_STARTED",
            Self::IllegalTransition => "ILLEGAL_TRANSITION",
            Self::TransientConflict => "TRANSIENT_CONFLICT",
            Self::Validation => "VALIDATION_ERROR",
            Self::Conflict => "CONFLICT",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Advisory HTTP status for a transport layer.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Forbidden => 403,
            Self::InvalidQuantity => 422,
            Self::InsufficientInventory
            | Self::EventNotUpcoming
            | Self::EventAlreadyStarted
            | Self::IllegalTransition
            | Self::Conflict => 409,
            Self::TransientConflict => 503,
            Self::Validation => 400,
            Self::Internal => 500,
        }
    }
}

impl TicketingError {
    /// Category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::EventNotFound(_) | Self::BookingNotFound(_) => ErrorKind::NotFound,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::InvalidQuantity { .. } => ErrorKind::InvalidQuantity,
            Self::InsufficientInventory { .. } => ErrorKind::InsufficientInventory,
            Self::EventNotUpcoming { .. } => ErrorKind::EventNotUpcoming,
            Self::EventAlreadyStarted { .. } => ErrorKind::EventAlreadyStarted,
            Self::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            Self::TransientConflict(_) => ErrorKind::TransientConflict,
            Self::InvalidPagination { .. } | Self::InvalidEvent(_) => ErrorKind::Validation,
            Self::CapacityBelowHeld { .. } | Self::EventHasBookings(_) => ErrorKind::Conflict,
            Self::Store(_) => ErrorKind::Internal,
        }
    }

    /// Whether re-running the whole operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientConflict(_))
    }
}

impl From<StoreError> for TicketingError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict(message) => Self::TransientConflict(message),
            other => Self::Store(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_become_retryable() {
        let error = TicketingError::from(StoreError::Conflict("40001".to_string()));
        assert!(error.is_retryable());
        assert_eq!(error.kind().code(), "TRANSIENT_CONFLICT");
        assert_eq!(error.kind().http_status(), 503);
    }

    #[test]
    fn other_store_errors_are_opaque_and_terminal() {
        let error = TicketingError::from(StoreError::Corrupt("bad row".to_string()));
        assert!(!error.is_retryable());
        assert_eq!(error.kind(), ErrorKind::Internal);
        assert!(matches!(error, TicketingError::Store(_)));
    }

    #[test]
    fn business_errors_have_distinct_codes() {
        let event_id = EventId::new();
        let errors = [
            TicketingError::EventNotFound(event_id),
            TicketingError::Forbidden { user_id: UserId::new(), booking_id: BookingId::new() },
            TicketingError::InvalidQuantity { requested: 0 },
            TicketingError::InsufficientInventory { event_id, requested: 2, available: 1 },
            TicketingError::EventNotUpcoming { event_id, status: EventStatus::Completed },
            TicketingError::EventAlreadyStarted { event_id, starts_at: Utc::now() },
            TicketingError::IllegalTransition {
                booking_id: BookingId::new(),
                from: BookingState::Cancelled,
                command: LifecycleCommand::CancelBooking,
            },
        ];
        let mut codes: Vec<&str> = errors.iter().map(|e| e.kind().code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(errors.iter().all(|e| !e.is_retryable()));
    }

    #[test]
    fn catalog_conflicts_map_to_409() {
        let error = TicketingError::EventHasBookings(EventId::new());
        assert_eq!(error.kind().code(), "CONFLICT");
        assert_eq!(error.kind().http_status(), 409);
    }
}
