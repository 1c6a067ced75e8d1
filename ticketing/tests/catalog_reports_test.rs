//! Catalog administration and sales report tests.
//!
//! Run with: `cargo test --test catalog_reports_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use chrono::Duration;
use std::sync::Arc;
use ticketing::{BookingService, EventCatalogService, ReportService, StatusCounts, TicketingError};
use ticketing_core::environment::Clock;
use ticketing_core::{Capacity, EventStatus, Money, UserId};
use ticketing_testing::{FixedClock, InMemoryStore, fixtures, test_clock};

struct Services {
    store: InMemoryStore,
    clock: FixedClock,
    catalog: EventCatalogService,
    bookings: BookingService,
    reports: ReportService,
}

fn services() -> Services {
    let store = InMemoryStore::new();
    let clock = test_clock();
    Services {
        catalog: EventCatalogService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
        ),
        bookings: BookingService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
        ),
        reports: ReportService::new(Arc::new(store.clone()), Arc::new(store.clone())),
        store,
        clock,
    }
}

#[tokio::test]
async fn test_created_event_is_upcoming_and_fully_available() {
    let s = services();
    let event = s.catalog.create_event(fixtures::draft(&s.clock, "Opening Night", 40)).await.unwrap();
    assert_eq!(event.status, EventStatus::Upcoming);
    assert_eq!(event.created_at, s.clock.now());

    let loaded = s.catalog.get_event(event.id).await.unwrap();
    assert_eq!(loaded.event, event);
    assert_eq!(loaded.available_seats, 40);
}

#[tokio::test]
async fn test_list_events_filters_and_reports_availability() {
    let s = services();
    let jazz = s.catalog.create_event(fixtures::draft(&s.clock, "Jazz Brunch", 10)).await.unwrap();
    s.catalog.create_event(fixtures::draft(&s.clock, "Poetry Slam", 10)).await.unwrap();
    let mut late = fixtures::draft(&s.clock, "Late Jazz Session", 5);
    late.starts_at = s.clock.now() + Duration::days(30);
    s.catalog.create_event(late).await.unwrap();

    s.bookings.purchase(UserId::new(), jazz.id, 4).await.unwrap();

    let page = s.catalog.list_events(1, 10, Some("JAZZ")).await.unwrap();
    assert_eq!(page.total_items, 2);
    let names: Vec<_> = page.items.iter().map(|e| e.event.name.as_str()).collect();
    assert_eq!(names, vec!["Jazz Brunch", "Late Jazz Session"]);
    assert_eq!(page.items[0].available_seats, 6);
    assert_eq!(page.items[1].available_seats, 5);

    let everything = s.catalog.list_events(1, 2, None).await.unwrap();
    assert_eq!(everything.total_items, 3);
    assert_eq!(everything.total_pages, 2);

    assert!(matches!(
        s.catalog.list_events(1, 0, None).await,
        Err(TicketingError::InvalidPagination { .. })
    ));
}

#[tokio::test]
async fn test_capacity_cannot_drop_below_held_seats() {
    let s = services();
    let event = s.catalog.create_event(fixtures::draft(&s.clock, "Workshop", 10)).await.unwrap();
    let user = UserId::new();
    let booking = s.bookings.purchase(user, event.id, 6).await.unwrap();

    let result = s.catalog.update_event(event.id, fixtures::draft(&s.clock, "Workshop", 5)).await;
    assert_eq!(
        result,
        Err(TicketingError::CapacityBelowHeld { event_id: event.id, capacity: 5, held: 6 })
    );

    let mut draft = fixtures::draft(&s.clock, "Workshop (extended)", 6);
    draft.price = Money::from_cents(3_000);
    let updated = s.catalog.update_event(event.id, draft).await.unwrap();
    assert_eq!(updated.capacity, Capacity::new(6));
    assert_eq!(updated.created_at, event.created_at);
    assert_eq!(s.bookings.available_seats(event.id).await.unwrap(), 0);

    // Frozen at purchase time.
    let stored = s.store.booking(booking.id).await.unwrap();
    assert_eq!(stored.subtotal, Money::from_cents(15_000));
}

#[tokio::test]
async fn test_booked_events_cannot_be_deleted() {
    let s = services();
    let booked = s.catalog.create_event(fixtures::draft(&s.clock, "Booked", 3)).await.unwrap();
    let empty = s.catalog.create_event(fixtures::draft(&s.clock, "Empty", 3)).await.unwrap();

    let user = UserId::new();
    let booking = s.bookings.purchase(user, booked.id, 1).await.unwrap();
    s.bookings.cancel_payment(user, booking.id).await.unwrap();

    assert_eq!(
        s.catalog.delete_event(booked.id).await,
        Err(TicketingError::EventHasBookings(booked.id))
    );
    s.catalog.delete_event(empty.id).await.unwrap();
    assert_eq!(
        s.catalog.get_event(empty.id).await,
        Err(TicketingError::EventNotFound(empty.id))
    );
}

#[tokio::test]
async fn test_completed_events_stop_selling() {
    let s = services();
    let event = s.catalog.create_event(fixtures::draft(&s.clock, "Finale", 3)).await.unwrap();
    s.catalog.set_event_status(event.id, EventStatus::Completed).await.unwrap();

    let result = s.bookings.purchase(UserId::new(), event.id, 1).await;
    assert!(matches!(
        result,
        Err(TicketingError::EventNotUpcoming { status: EventStatus::Completed, .. })
    ));
    assert!(matches!(
        s.catalog.set_event_status(event.id, EventStatus::Ongoing).await,
        Err(TicketingError::InvalidEvent(_))
    ));
}

#[tokio::test]
async fn test_reports_count_confirmed_sales_only() {
    let s = services();
    let gala = s.catalog.create_event(fixtures::draft(&s.clock, "Gala", 10)).await.unwrap();
    let talk = s.catalog.create_event(fixtures::draft(&s.clock, "Talk", 4)).await.unwrap();
    s.catalog.set_event_status(talk.id, EventStatus::Ongoing).await.unwrap();

    let alice = UserId::new();
    let bob = UserId::new();
    let paid = s.bookings.purchase(alice, gala.id, 3).await.unwrap();
    s.bookings.confirm_payment(alice, paid.id).await.unwrap();
    s.bookings.purchase(bob, gala.id, 2).await.unwrap();
    let dropped = s.bookings.purchase(bob, gala.id, 1).await.unwrap();
    s.bookings.cancel_payment(bob, dropped.id).await.unwrap();

    let summary = s.reports.summary().await.unwrap();
    assert_eq!(summary.total_events, 2);
    assert_eq!(summary.total_bookings, 3);
    assert_eq!(summary.tickets_sold, 3);
    assert_eq!(summary.revenue, Money::from_cents(7_500));
    assert_eq!(summary.events_by_status, StatusCounts { upcoming: 1, ongoing: 1, completed: 0 });

    let reports = s.reports.event_reports().await.unwrap();
    let gala_report = reports.iter().find(|r| r.event_id == gala.id).unwrap();
    assert_eq!(gala_report.event_name, "Gala");
    assert_eq!(gala_report.capacity, 10);
    assert_eq!(gala_report.tickets_sold, 3);
    assert_eq!(gala_report.seats_held, 5);
    assert_eq!(gala_report.revenue, Money::from_cents(7_500));
    assert!((gala_report.occupancy_rate - 30.0).abs() < 1e-9);

    let talk_report = reports.iter().find(|r| r.event_id == talk.id).unwrap();
    assert_eq!(talk_report.tickets_sold, 0);
    assert!(talk_report.occupancy_rate.abs() < 1e-9);
}
