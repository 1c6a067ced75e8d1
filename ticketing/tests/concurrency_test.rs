//! Concurrency tests.
//!
//! Races many purchasers against a small event and conflicting commands against one
//! booking. No interleaving may oversell or apply two transitions to the same booking.
//!
//! Run with: `cargo test --test concurrency_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use futures::future::join_all;
use std::sync::Arc;
use ticketing::{BookingService, TicketingError};
use ticketing_core::{BookingState, UserId};
use ticketing_testing::{InMemoryStore, fixtures, test_clock};

fn service(store: &InMemoryStore) -> BookingService {
    BookingService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(test_clock()),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_purchases_never_oversell() {
    const CAPACITY: u32 = 5;
    const BUYERS: usize = 25;

    let store = InMemoryStore::new();
    let event = fixtures::upcoming_event(&test_clock(), CAPACITY);
    store.seed_event(event.clone()).await;
    let service = service(&store);
    let event_id = event.id;

    let handles = (0..BUYERS).map(|_| {
        let service = service.clone();
        tokio::spawn(async move { service.purchase(UserId::new(), event_id, 1).await })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("purchase task panicked"))
        .collect();

    let sold = results.iter().filter(|r| r.is_ok()).count();
    let sold_out = results
        .iter()
        .filter(|r| matches!(r, Err(TicketingError::InsufficientInventory { .. })))
        .count();

    assert_eq!(sold, CAPACITY as usize);
    assert_eq!(sold_out, BUYERS - CAPACITY as usize);
    assert_eq!(service.available_seats(event.id).await.unwrap(), 0);

    let held: u32 = store
        .bookings_for_event(event.id)
        .await
        .iter()
        .map(ticketing_core::Booking::seats_held)
        .sum();
    assert_eq!(held, CAPACITY);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_quantities_fill_exactly_to_capacity() {
    let store = InMemoryStore::new();
    let event = fixtures::upcoming_event(&test_clock(), 10);
    store.seed_event(event.clone()).await;
    let service = service(&store);
    let event_id = event.id;

    let handles = [3_i64, 4, 2, 3, 1, 4, 2].into_iter().map(|quantity| {
        let service = service.clone();
        tokio::spawn(async move { service.purchase(UserId::new(), event_id, quantity).await })
    });
    let granted: u32 = join_all(handles)
        .await
        .into_iter()
        .filter_map(|joined| joined.expect("purchase task panicked").ok())
        .map(|booking| booking.quantity.value())
        .sum();

    assert!(granted <= 10);
    let available = service.available_seats(event.id).await.unwrap();
    assert_eq!(granted + available, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_conflicting_transitions_on_one_booking_apply_once() {
    let store = InMemoryStore::new();
    let event = fixtures::upcoming_event(&test_clock(), 3);
    store.seed_event(event.clone()).await;
    let service = service(&store);
    let user = UserId::new();
    let booking_id = service.purchase(user, event.id, 2).await.unwrap().id;

    let confirm = {
        let service = service.clone();
        tokio::spawn(async move { service.confirm_payment(user, booking_id).await })
    };
    let cancel = {
        let service = service.clone();
        tokio::spawn(async move { service.cancel_payment(user, booking_id).await })
    };
    let confirm = confirm.await.unwrap();
    let cancel = cancel.await.unwrap();

    assert_ne!(confirm.is_ok(), cancel.is_ok(), "exactly one command must win");
    let loser = if confirm.is_ok() { &cancel } else { &confirm };
    assert!(matches!(loser, Err(TicketingError::IllegalTransition { .. })));

    let stored = store.booking(booking_id).await.unwrap();
    let available = service.available_seats(event.id).await.unwrap();
    assert_ne!(stored.state, BookingState::Reserved, "neither command was applied");
    let expected = if stored.state == BookingState::Confirmed { 1 } else { 3 };
    assert_eq!(available, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_cancellations_release_once() {
    let store = InMemoryStore::new();
    let event = fixtures::upcoming_event(&test_clock(), 4);
    store.seed_event(event.clone()).await;
    let service = service(&store);
    let user = UserId::new();
    let booking_id = service.purchase(user, event.id, 4).await.unwrap().id;

    let handles = (0..8).map(|_| {
        let service = service.clone();
        tokio::spawn(async move { service.cancel_payment(user, booking_id).await })
    });
    let results: Vec<_> = join_all(handles).await.into_iter().map(Result::unwrap).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter(|r| r.is_err())
        .all(|r| matches!(r, Err(TicketingError::IllegalTransition { .. }))));
    assert_eq!(service.available_seats(event.id).await.unwrap(), 4);
}
