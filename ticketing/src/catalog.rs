//! Event Catalog administration.
//!
//! Writes to the catalog go through a unit of work like bookings do. Edits that can
//! affect inventory (capacity changes) take the event lock first, so they serialize
//! with purchases of the same event.

use crate::error::{Result, TicketingError};
use crate::inventory::InventoryLedger;
use crate::metrics;
use crate::service::{DEFAULT_MAX_PAGE_SIZE, end_read, finish, page_request};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use ticketing_core::environment::Clock;
use ticketing_core::{
    Event, EventCatalog, EventDraft, EventId, EventSales, EventStatus, Page, PersistenceGateway,
    StoreError, UnitOfWork,
};

/// An event together with its seats still for sale
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAvailability {
    /// The event
    pub event: Event,
    /// `capacity - held` at read time
    pub available_seats: u32,
}

impl EventAvailability {
    fn from_sales(event: Event, sales: Option<&EventSales>) -> Self {
        let held = sales.map_or(0, |s| s.reserved_seats + s.confirmed_seats);
        let held = u32::try_from(held).unwrap_or(u32::MAX);
        let available_seats = event.capacity.value().saturating_sub(held);
        Self { event, available_seats }
    }
}

fn duplicate_name(name: &str, error: StoreError) -> TicketingError {
    match error {
        StoreError::Duplicate(_) => {
            TicketingError::InvalidEvent(format!("an event named '{name}' already exists"))
        }
        other => other.into(),
    }
}

/// Create, edit, advance and delete catalog events.
#[derive(Clone)]
pub struct EventCatalogService {
    catalog: Arc<dyn EventCatalog>,
    gateway: Arc<dyn PersistenceGateway>,
    clock: Arc<dyn Clock>,
    ledger: InventoryLedger,
    max_page_size: u32,
}

impl EventCatalogService {
    /// Create a catalog service over the given collaborators.
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
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    /// Override the largest accepted page size.
    #[must_use]
    pub const fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    /// Create a new `Upcoming` event.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InvalidEvent`] for a blank name or location, zero capacity, or a
    /// name already in use; otherwise a store failure.
    #[tracing::instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_event(&self, draft: EventDraft) -> Result<Event> {
        draft.validate().map_err(TicketingError::InvalidEvent)?;

        let event = Event::from_draft(EventId::new(), draft, self.clock.now());
        let mut uow = self.gateway.begin().await?;
        let outcome = uow
            .insert_event(&event)
            .await
            .map_err(|e| duplicate_name(&event.name, e));
        finish(uow, outcome).await?;

        metrics::record_event_created();
        tracing::info!(event_id = %event.id, capacity = %event.capacity, "Event created");
        Ok(event)
    }

    /// Load one event with its available seats.
    ///
    /// # Errors
    ///
    /// [`TicketingError::EventNotFound`] or a store failure.
    #[tracing::instrument(skip(self), fields(event_id = %event_id))]
    pub async fn get_event(&self, event_id: EventId) -> Result<EventAvailability> {
        let event = self
            .catalog
            .get_event(event_id)
            .await?
            .ok_or(TicketingError::EventNotFound(event_id))?;

        let mut uow = self.gateway.begin().await?;
        let outcome = self.ledger.seat_count_in(uow.as_mut(), &event).await;
        let seats = end_read(uow, outcome).await?;
        Ok(EventAvailability {
            event,
            available_seats: seats.available,
        })
    }

    /// Events ordered by start time, optionally filtered by `search`.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InvalidPagination`] or a store failure.
    #[tracing::instrument(skip(self))]
    pub async fn list_events(
        &self,
        page: i64,
        page_size: i64,
        search: Option<&str>,
    ) -> Result<Page<EventAvailability>> {
        let request = page_request(page, page_size, self.max_page_size)?;
        let (events, total) = self.catalog.list_events(request, search).await?;

        let sales: HashMap<EventId, EventSales> = self
            .gateway
            .sales_by_event()
            .await?
            .into_iter()
            .map(|s| (s.event_id, s))
            .collect();

        let page = Page::new(events, request, total);
        Ok(page.map(|event| {
            let figures = sales.get(&event.id);
            EventAvailability::from_sales(event, figures)
        }))
    }

    /// Replace an `Upcoming` event's details.
    ///
    /// # Errors
    ///
    /// - [`TicketingError::InvalidEvent`] for an invalid draft or a taken name
    /// - [`TicketingError::EventNotFound`], [`TicketingError::EventNotUpcoming`]
    /// - [`TicketingError::CapacityBelowHeld`] if seats already held exceed the new capacity
    /// - [`TicketingError::TransientConflict`], [`TicketingError::Store`]
    #[tracing::instrument(skip(self, draft), fields(event_id = %event_id))]
    pub async fn update_event(&self, event_id: EventId, draft: EventDraft) -> Result<Event> {
        draft.validate().map_err(TicketingError::InvalidEvent)?;

        let now = self.clock.now();
        let mut uow = self.gateway.begin().await?;
        let outcome = self.update_locked(uow.as_mut(), event_id, draft, now).await;
        let event = finish(uow, outcome).await?;

        tracing::info!(capacity = %event.capacity, "Event updated");
        Ok(event)
    }

    async fn update_locked(
        &self,
        uow: &mut dyn UnitOfWork,
        event_id: EventId,
        draft: EventDraft,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Event> {
        let current = uow
            .lock_event(event_id)
            .await?
            .ok_or(TicketingError::EventNotFound(event_id))?;

        if current.status != EventStatus::Upcoming {
            return Err(TicketingError::EventNotUpcoming {
                event_id,
                status: current.status,
            });
        }

        let seats = self.ledger.seat_count_in(uow, &current).await?;
        if draft.capacity.value() < seats.held {
            return Err(TicketingError::CapacityBelowHeld {
                event_id,
                capacity: draft.capacity.value(),
                held: seats.held,
            });
        }

        let event = Event {
            status: current.status,
            created_at: current.created_at,
            updated_at: now,
            ..Event::from_draft(event_id, draft, now)
        };
        uow.update_event(&event)
            .await
            .map_err(|e| duplicate_name(&event.name, e))?;
        Ok(event)
    }

    /// Move an event forward in its lifecycle.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InvalidEvent`] when `status` is not after the current one,
    /// [`TicketingError::EventNotFound`], or a store failure.
    #[tracing::instrument(skip(self), fields(event_id = %event_id, status = %status))]
    pub async fn set_event_status(&self, event_id: EventId, status: EventStatus) -> Result<Event> {
        let now = self.clock.now();
        let mut uow = self.gateway.begin().await?;
        let outcome = Self::advance_locked(uow.as_mut(), event_id, status, now).await;
        let event = finish(uow, outcome).await?;

        tracing::info!("Event status changed");
        Ok(event)
    }

    async fn advance_locked(
        uow: &mut dyn UnitOfWork,
        event_id: EventId,
        status: EventStatus,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Event> {
        let mut event = uow
            .lock_event(event_id)
            .await?
            .ok_or(TicketingError::EventNotFound(event_id))?;

        if !event.status.can_advance_to(status) {
            return Err(TicketingError::InvalidEvent(format!(
                "cannot move event from {} to {status}",
                event.status
            )));
        }

        event.status = status;
        event.updated_at = now;
        uow.update_event(&event).await?;
        Ok(event)
    }

    /// Delete an event that has never been booked.
    ///
    /// # Errors
    ///
    /// [`TicketingError::EventHasBookings`] if any booking row references it (cancelled
    /// ones included), [`TicketingError::EventNotFound`], or a store failure.
    #[tracing::instrument(skip(self), fields(event_id = %event_id))]
    pub async fn delete_event(&self, event_id: EventId) -> Result<()> {
        let mut uow = self.gateway.begin().await?;
        let outcome = Self::delete_locked(uow.as_mut(), event_id).await;
        finish(uow, outcome).await?;

        tracing::info!("Event deleted");
        Ok(())
    }

    async fn delete_locked(uow: &mut dyn UnitOfWork, event_id: EventId) -> Result<()> {
        uow.lock_event(event_id)
            .await?
            .ok_or(TicketingError::EventNotFound(event_id))?;

        if !uow.read_bookings_for_event(event_id).await?.is_empty() {
            return Err(TicketingError::EventHasBookings(event_id));
        }

        uow.delete_event(event_id).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ticketing_core::{Capacity, Money};
    use ticketing_testing::{fixtures, test_clock, InMemoryStore};

    fn service(store: &InMemoryStore) -> EventCatalogService {
        EventCatalogService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(test_clock()),
        )
    }

    #[test]
    fn availability_counts_reserved_and_confirmed_seats() {
        let event = fixtures::upcoming_event(&test_clock(), 10);
        let sales = EventSales {
            event_id: event.id,
            bookings: 3,
            reserved_seats: 2,
            confirmed_seats: 5,
            confirmed_revenue: Money::from_cents(0),
        };
        assert_eq!(EventAvailability::from_sales(event.clone(), Some(&sales)).available_seats, 3);
        assert_eq!(EventAvailability::from_sales(event, None).available_seats, 10);
    }

    #[tokio::test]
    async fn create_event_validates_the_draft() {
        let store = InMemoryStore::new();
        let mut draft = fixtures::draft(&test_clock(), "Gala", 10);
        draft.capacity = Capacity::new(0);

        let result = service(&store).create_event(draft).await;
        assert!(matches!(result, Err(TicketingError::InvalidEvent(_))));
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn create_event_rejects_taken_names() {
        let store = InMemoryStore::new();
        let catalog = service(&store);
        catalog.create_event(fixtures::draft(&test_clock(), "Gala", 10)).await.unwrap();

        let result = catalog.create_event(fixtures::draft(&test_clock(), "Gala", 20)).await;
        assert!(matches!(result, Err(TicketingError::InvalidEvent(message)) if message.contains("Gala")));
    }

    #[tokio::test]
    async fn status_only_moves_forward() {
        let store = InMemoryStore::new();
        let catalog = service(&store);
        let event = catalog.create_event(fixtures::draft(&test_clock(), "Gala", 10)).await.unwrap();

        let ongoing = catalog.set_event_status(event.id, EventStatus::Ongoing).await.unwrap();
        assert_eq!(ongoing.status, EventStatus::Ongoing);

        let back = catalog.set_event_status(event.id, EventStatus::Upcoming).await;
        assert!(matches!(back, Err(TicketingError::InvalidEvent(_))));

        let edit = catalog.update_event(event.id, fixtures::draft(&test_clock(), "Gala", 12)).await;
        assert!(matches!(edit, Err(TicketingError::EventNotUpcoming { status: EventStatus::Ongoing, .. })));
    }

    #[tokio::test]
    async fn delete_unknown_event_is_not_found() {
        let store = InMemoryStore::new();
        let id = EventId::new();
        assert_eq!(service(&store).delete_event(id).await, Err(TicketingError::EventNotFound(id)));
    }
}
