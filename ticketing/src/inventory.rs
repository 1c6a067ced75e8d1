//! Inventory Ledger.
//!
//! Seats are never counted in a stored field. The ledger derives them from booking rows:
//!
//! ```text
//! available = capacity - Σ quantity of bookings in (Reserved | Confirmed)
//! ```
//!
//! [`InventoryLedger::reserve`] runs inside the caller's unit of work. It locks the
//! event row first, so no other purchaser of the same event can evaluate availability
//! until this unit of work commits or rolls back, then re-reads every booking of the
//! event through the same unit of work. The availability check and the booking insert
//! that follows therefore act on the same live view.

use crate::error::{Result, TicketingError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ticketing_core::{
    Booking, BookingId, BookingState, Event, EventId, EventStatus, Money, Quantity, UnitOfWork,
    UserId,
};

use crate::lifecycle::BookingLifecycle;

/// Seat counts for one event at one point in time
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatCount {
    /// Total seats
    pub capacity: u32,
    /// Seats held by Reserved + Confirmed bookings
    pub held: u32,
    /// `capacity - held` (never negative)
    pub available: u32,
}

impl SeatCount {
    fn new(capacity: u32, held: u64) -> Self {
        let held = u32::try_from(held).unwrap_or(u32::MAX);
        Self {
            capacity,
            held,
            available: capacity.saturating_sub(held),
        }
    }
}

/// Seats granted by [`InventoryLedger::reserve`], valid only inside the unit of work
/// that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reservation {
    event_id: EventId,
    quantity: Quantity,
    unit_price: Money,
    subtotal: Money,
    seats: SeatCount,
}

impl Reservation {
    /// Event the seats belong to
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        self.event_id
    }

    /// Seats granted
    #[must_use]
    pub const fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// Price × quantity at reservation time
    #[must_use]
    pub const fn subtotal(&self) -> Money {
        self.subtotal
    }

    /// Seat counts observed before this reservation
    #[must_use]
    pub const fn seats_before(&self) -> SeatCount {
        self.seats
    }

    /// Turn the reservation into a new booking in the lifecycle's initial state.
    #[must_use]
    pub fn into_booking(self, user_id: UserId, now: DateTime<Utc>) -> Booking {
        Booking {
            id: BookingId::new(),
            user_id,
            event_id: self.event_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            subtotal: self.subtotal,
            booked_at: now,
            updated_at: now,
            state: BookingLifecycle::initial(),
        }
    }
}

/// Seats returned to the pool by a state change
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Booking whose state changed
    pub booking_id: BookingId,
    /// Its event
    pub event_id: EventId,
    /// Seats given back (0 if the booking held none before or still holds them after)
    pub seats: u32,
}

/// Derives availability from booking rows and grants reservations.
#[derive(Clone, Copy, Debug, Default)]
pub struct InventoryLedger;

impl InventoryLedger {
    /// Σ quantity of bookings that currently hold seats
    #[must_use]
    pub fn held_seats(bookings: &[Booking]) -> u64 {
        bookings.iter().map(|b| u64::from(b.seats_held())).sum()
    }

    /// Seat counts for `event` given all of its bookings
    #[must_use]
    pub fn seat_count(event: &Event, bookings: &[Booking]) -> SeatCount {
        SeatCount::new(event.capacity.value(), Self::held_seats(bookings))
    }

    /// Read the live seat counts of an event through `uow`, without locking the event.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the bookings cannot be read.
    pub async fn seat_count_in(
        &self,
        uow: &mut dyn UnitOfWork,
        event: &Event,
    ) -> Result<SeatCount> {
        let bookings = uow.read_bookings_for_event(event.id).await?;
        Ok(Self::seat_count(event, &bookings))
    }

    /// Reserve `requested` seats of `event_id` inside `uow`.
    ///
    /// Locks the event, re-validates that it is still `Upcoming`, and checks the request
    /// against the live booking rows. Nothing is written; the caller inserts the booking
    /// in the same unit of work.
    ///
    /// # Errors
    ///
    /// - [`TicketingError::InvalidQuantity`] if `requested` is not positive, exceeds the
    ///   event's total capacity, or the subtotal overflows
    /// - [`TicketingError::EventNotFound`] / [`TicketingError::EventNotUpcoming`]
    /// - [`TicketingError::InsufficientInventory`] if fewer seats remain
    /// - [`TicketingError::TransientConflict`] on lock contention
    pub async fn reserve(
        &self,
        uow: &mut dyn UnitOfWork,
        event_id: EventId,
        requested: i64,
    ) -> Result<Reservation> {
        let quantity =
            Quantity::try_from(requested).map_err(|_| TicketingError::InvalidQuantity { requested })?;

        let event = uow
            .lock_event(event_id)
            .await?
            .ok_or(TicketingError::EventNotFound(event_id))?;

        if event.status != EventStatus::Upcoming {
            return Err(TicketingError::EventNotUpcoming {
                event_id,
                status: event.status,
            });
        }

        if quantity.value() > event.capacity.value() {
            return Err(TicketingError::InvalidQuantity { requested });
        }

        let seats = self.seat_count_in(uow, &event).await?;
        if quantity.value() > seats.available {
            return Err(TicketingError::InsufficientInventory {
                event_id,
                requested: quantity.value(),
                available: seats.available,
            });
        }

        let subtotal = event
            .price
            .checked_multiply(quantity.value())
            .ok_or(TicketingError::InvalidQuantity { requested })?;

        Ok(Reservation {
            event_id,
            quantity,
            unit_price: event.price,
            subtotal,
            seats,
        })
    }

    /// Seats released by moving `booking` to `next`.
    ///
    /// Only a booking that holds seats before and none after releases anything, so a
    /// booking can give its seats back at most once.
    #[must_use]
    pub const fn release(&self, booking: &Booking, next: BookingState) -> Release {
        let seats = if booking.state.holds_seats() && !next.holds_seats() {
            booking.quantity.value()
        } else {
            0
        };
        Release {
            booking_id: booking.id,
            event_id: booking.event_id,
            seats,
        }
    }
}
