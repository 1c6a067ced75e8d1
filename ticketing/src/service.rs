//! Booking Service.
//!
//! Orchestrates the [`InventoryLedger`] and the [`BookingLifecycle`] against the
//! injected [`EventCatalog`] and [`PersistenceGateway`]. Every mutating operation is one
//! unit of work: read current state, validate, write, then commit. Any failure rolls
//! the unit of work back, so no partial write is ever visible.
//!
//! The service never retries. A [`TicketingError::TransientConflict`] is returned to the
//! caller, who may resubmit (see [`crate::retry`]).
//!
//! Catalog and gateway reads that happen outside a unit of work are always finished
//! before the unit of work is opened.

use crate::error::{Result, TicketingError};
use crate::inventory::{InventoryLedger, Release};
use crate::lifecycle::{BookingLifecycle, LifecycleCommand, Schedule};
use crate::metrics;
use std::sync::Arc;
use std::time::Instant;
use ticketing_core::environment::Clock;
use ticketing_core::{
    Booking, BookingId, Event, EventCatalog, EventId, EventStatus, Page, PageRequest,
    PersistenceGateway, Transition, UnitOfWork, UserId,
};

/// Default upper bound for `page_size`
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

/// Commit on success, roll back on failure, and hand back the outcome.
pub(crate) async fn finish<T>(uow: Box<dyn UnitOfWork>, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = uow.rollback().await {
                tracing::warn!(error = %rollback_error, "Rollback failed");
            }
            Err(error)
        }
    }
}

/// End a unit of work that only read; it is rolled back.
pub(crate) async fn end_read<T>(uow: Box<dyn UnitOfWork>, outcome: Result<T>) -> Result<T> {
    if let Err(error) = uow.rollback().await {
        tracing::warn!(error = %error, "Rollback of read-only unit of work failed");
    }
    outcome
}

/// Validate raw pagination input against `max_page_size`.
pub(crate) fn page_request(page: i64, page_size: i64, max_page_size: u32) -> Result<PageRequest> {
    let invalid = TicketingError::InvalidPagination {
        page,
        page_size,
        max_page_size,
    };
    let request = PageRequest::new(page, page_size).map_err(|_| invalid.clone())?;
    if request.page_size() > max_page_size {
        return Err(invalid);
    }
    Ok(request)
}

fn count_conflict<T>(operation: &'static str, result: &Result<T>) {
    if matches!(result, Err(TicketingError::TransientConflict(_))) {
        metrics::record_transient_conflict(operation);
    }
}

/// Purchase, payment and cancellation of bookings.
///
/// # Example
///
/// ```ignore
/// let store = InMemoryStore::new();
/// let service = BookingService::new(
///     Arc::new(store.clone()),
///     Arc::new(store),
///     Arc::new(SystemClock),
/// );
///
/// let booking = service.purchase(user_id, event_id, 2).await?;
/// let booking = service.confirm_payment(user_id, booking.id).await?;
/// ```
#[derive(Clone)]
pub struct BookingService {
    catalog: Arc<dyn EventCatalog>,
    gateway: Arc<dyn PersistenceGateway>,
    clock: Arc<dyn Clock>,
    ledger: InventoryLedger,
    lifecycle: BookingLifecycle,
    max_page_size: u32,
}

impl BookingService {
    /// Create a booking service over the given collaborators.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn EventCatalog>,
        gateway: Arc<dyn PersistenceGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            gateway,
            clock,
            ledger: InventoryLedger,
            lifecycle: BookingLifecycle,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    /// Override the largest accepted page size.
    #[must_use]
    pub const fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    /// Reserve `quantity` seats of `event_id` for `user_id`.
    ///
    /// The new booking is `(Reserved, Pending)` with `subtotal = price × quantity`
    /// frozen at this moment.
    ///
    /// # Errors
    ///
    /// - [`TicketingError::EventNotFound`], [`TicketingError::EventNotUpcoming`]
    /// - [`TicketingError::InvalidQuantity`], [`TicketingError::InsufficientInventory`]
    /// - [`TicketingError::TransientConflict`], [`TicketingError::Store`]
    #[tracing::instrument(skip(self), fields(user_id = %user_id, event_id = %event_id))]
    pub async fn purchase(&self, user_id: UserId, event_id: EventId, quantity: i64) -> Result<Booking> {
        let started = Instant::now();
        let result = self.try_purchase(user_id, event_id, quantity).await;

        match &result {
            Ok(booking) => {
                metrics::record_purchase("reserved", booking.quantity.value(), started.elapsed());
                tracing::info!(
                    booking_id = %booking.id,
                    quantity = booking.quantity.value(),
                    subtotal = %booking.subtotal,
                    "Booking reserved"
                );
            }
            Err(error) => {
                metrics::record_purchase(error.kind().code(), 0, started.elapsed());
                tracing::warn!(error = %error, "Purchase rejected");
            }
        }
        count_conflict("purchase", &result);
        result
    }

    async fn try_purchase(&self, user_id: UserId, event_id: EventId, quantity: i64) -> Result<Booking> {
        // Fast rejection from the catalog; the ledger re-checks under the event lock.
        let event = self.load_event(event_id).await?;
        if event.status != EventStatus::Upcoming {
            return Err(TicketingError::EventNotUpcoming {
                event_id,
                status: event.status,
            });
        }

        let now = self.clock.now();
        let mut uow = self.gateway.begin().await?;
        let outcome = self.reserve_booking(uow.as_mut(), user_id, event_id, quantity, now).await;
        finish(uow, outcome).await
    }

    async fn reserve_booking(
        &self,
        uow: &mut dyn UnitOfWork,
        user_id: UserId,
        event_id: EventId,
        quantity: i64,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Booking> {
        let reservation = self.ledger.reserve(uow, event_id, quantity).await?;
        let booking = reservation.into_booking(user_id, now);
        uow.insert_booking(&booking).await?;
        Ok(booking)
    }

    /// Confirm payment for a `(Reserved, Pending)` booking.
    ///
    /// # Errors
    ///
    /// - [`TicketingError::BookingNotFound`], [`TicketingError::Forbidden`]
    /// - [`TicketingError::IllegalTransition`] unless the booking is Reserved
    /// - [`TicketingError::EventAlreadyStarted`] once the event's start is reached
    /// - [`TicketingError::TransientConflict`], [`TicketingError::Store`]
    #[tracing::instrument(skip(self), fields(user_id = %user_id, booking_id = %booking_id))]
    pub async fn confirm_payment(&self, user_id: UserId, booking_id: BookingId) -> Result<Booking> {
        let result = self.apply(user_id, booking_id, LifecycleCommand::ConfirmPayment).await;
        if let Ok((booking, _)) = &result {
            metrics::record_payment_confirmed(booking.subtotal.cents());
        }
        result.map(|(booking, _)| booking)
    }

    /// Abandon payment for a `(Reserved, Pending)` booking, releasing its seats.
    ///
    /// Not time-guarded: an unpaid hold can always be dropped.
    ///
    /// # Errors
    ///
    /// - [`TicketingError::BookingNotFound`], [`TicketingError::Forbidden`]
    /// - [`TicketingError::IllegalTransition`] unless the booking is Reserved
    /// - [`TicketingError::TransientConflict`], [`TicketingError::Store`]
    #[tracing::instrument(skip(self), fields(user_id = %user_id, booking_id = %booking_id))]
    pub async fn cancel_payment(&self, user_id: UserId, booking_id: BookingId) -> Result<Booking> {
        let result = self.apply(user_id, booking_id, LifecycleCommand::CancelPayment).await;
        if let Ok((_, release)) = &result {
            metrics::record_payment_cancelled();
            metrics::record_tickets_released(release.seats);
        }
        result.map(|(booking, _)| booking)
    }

    /// Cancel a `(Confirmed, Paid)` booking before the event starts, releasing its seats.
    ///
    /// # Errors
    ///
    /// - [`TicketingError::BookingNotFound`], [`TicketingError::Forbidden`]
    /// - [`TicketingError::IllegalTransition`] unless the booking is Confirmed
    /// - [`TicketingError::EventAlreadyStarted`] once the event's start is reached
    /// - [`TicketingError::TransientConflict`], [`TicketingError::Store`]
    #[tracing::instrument(skip(self), fields(user_id = %user_id, booking_id = %booking_id))]
    pub async fn cancel_booking(&self, user_id: UserId, booking_id: BookingId) -> Result<Booking> {
        let result = self.apply(user_id, booking_id, LifecycleCommand::CancelBooking).await;
        if let Ok((_, release)) = &result {
            metrics::record_payment_refunded();
            metrics::record_tickets_released(release.seats);
        }
        result.map(|(booking, _)| booking)
    }

    async fn apply(
        &self,
        user_id: UserId,
        booking_id: BookingId,
        command: LifecycleCommand,
    ) -> Result<(Booking, Release)> {
        let result = self.try_apply(user_id, booking_id, command).await;

        match &result {
            Ok((booking, release)) => tracing::info!(
                command = command.as_str(),
                state = %booking.state,
                released = release.seats,
                "Booking transitioned"
            ),
            Err(error) => tracing::warn!(
                command = command.as_str(),
                error = %error,
                "Booking transition rejected"
            ),
        }
        count_conflict(command.as_str(), &result);
        result
    }

    async fn try_apply(
        &self,
        user_id: UserId,
        booking_id: BookingId,
        command: LifecycleCommand,
    ) -> Result<(Booking, Release)> {
        // Owner and event never change after purchase, so they can be checked up front.
        let booking = self.load_owned_booking(user_id, booking_id).await?;
        let event = self.load_event(booking.event_id).await?;
        let schedule = Schedule::new(self.clock.now(), event.starts_at);

        let mut uow = self.gateway.begin().await?;
        let outcome = self.transition_locked(uow.as_mut(), booking_id, command, &schedule).await;
        finish(uow, outcome).await
    }

    async fn transition_locked(
        &self,
        uow: &mut dyn UnitOfWork,
        booking_id: BookingId,
        command: LifecycleCommand,
        schedule: &Schedule,
    ) -> Result<(Booking, Release)> {
        let mut booking = uow
            .lock_booking(booking_id)
            .await?
            .ok_or(TicketingError::BookingNotFound(booking_id))?;

        let next = self
            .lifecycle
            .transition(&booking.state, command, schedule)
            .map_err(|e| e.into_ticketing_error(booking_id, booking.event_id))?;

        uow.update_booking_state(booking_id, next, schedule.now).await?;

        let release = self.ledger.release(&booking, next);
        booking.state = next;
        booking.updated_at = schedule.now;
        Ok((booking, release))
    }

    /// Load one booking owned by `user_id`.
    ///
    /// # Errors
    ///
    /// [`TicketingError::BookingNotFound`], [`TicketingError::Forbidden`] or a store failure.
    #[tracing::instrument(skip(self), fields(user_id = %user_id, booking_id = %booking_id))]
    pub async fn get_booking(&self, user_id: UserId, booking_id: BookingId) -> Result<Booking> {
        self.load_owned_booking(user_id, booking_id).await
    }

    /// Bookings owned by `user_id`, newest first.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InvalidPagination`] or a store failure.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_for_user(&self, user_id: UserId, page: i64, page_size: i64) -> Result<Page<Booking>> {
        let request = page_request(page, page_size, self.max_page_size)?;
        let (items, total) = self.gateway.list_bookings_for_user(user_id, request).await?;
        Ok(Page::new(items, request, total))
    }

    /// Every booking, newest first. Privileged.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InvalidPagination`] or a store failure.
    #[tracing::instrument(skip(self))]
    pub async fn list_all(&self, page: i64, page_size: i64) -> Result<Page<Booking>> {
        let request = page_request(page, page_size, self.max_page_size)?;
        let (items, total) = self.gateway.list_bookings(request).await?;
        Ok(Page::new(items, request, total))
    }

    /// Seats still available for `event_id`.
    ///
    /// # Errors
    ///
    /// [`TicketingError::EventNotFound`] or a store failure.
    #[tracing::instrument(skip(self), fields(event_id = %event_id))]
    pub async fn available_seats(&self, event_id: EventId) -> Result<u32> {
        let event = self.load_event(event_id).await?;
        let mut uow = self.gateway.begin().await?;
        let outcome = self.ledger.seat_count_in(uow.as_mut(), &event).await;
        let seats = end_read(uow, outcome).await?;
        Ok(seats.available)
    }

    async fn load_event(&self, event_id: EventId) -> Result<Event> {
        self.catalog
            .get_event(event_id)
            .await?
            .ok_or(TicketingError::EventNotFound(event_id))
    }

    async fn load_owned_booking(&self, user_id: UserId, booking_id: BookingId) -> Result<Booking> {
        let booking = self
            .gateway
            .find_booking(booking_id)
            .await?
            .ok_or(TicketingError::BookingNotFound(booking_id))?;

        if !booking.is_owned_by(user_id) {
            return Err(TicketingError::Forbidden { user_id, booking_id });
        }
        Ok(booking)
    }
}
