//! Property tests for the inventory invariant.
//!
//! Arbitrary interleavings of purchases, payments, cancellations and clock moves must
//! never hold more seats than the event has, and the service's view of availability
//! must always agree with the booking rows.
//!
//! Run with: `cargo test --test inventory_properties_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use chrono::Duration;
use proptest::prelude::*;
use std::sync::Arc;
use ticketing::{BookingService, TicketingError};
use ticketing_core::environment::Clock;
use ticketing_core::{Booking, BookingId, BookingState, UserId};
use ticketing_testing::{InMemoryStore, ManualClock, fixtures, test_clock};

#[derive(Clone, Debug)]
enum Op {
    Purchase { user: usize, quantity: i64 },
    Confirm { pick: usize },
    CancelPayment { pick: usize },
    CancelBooking { pick: usize },
    Advance { hours: i64 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..3usize, -1i64..5).prop_map(|(user, quantity)| Op::Purchase { user, quantity }),
        2 => any::<usize>().prop_map(|pick| Op::Confirm { pick }),
        2 => any::<usize>().prop_map(|pick| Op::CancelPayment { pick }),
        2 => any::<usize>().prop_map(|pick| Op::CancelBooking { pick }),
        1 => (1i64..72).prop_map(|hours| Op::Advance { hours }),
    ]
}

fn pick(made: &[(UserId, BookingId)], i: usize) -> Option<(UserId, BookingId)> {
    if made.is_empty() {
        None
    } else {
        Some(made[i % made.len()])
    }
}

fn held(bookings: &[Booking]) -> u32 {
    bookings.iter().map(Booking::seats_held).sum()
}

async fn run(capacity: u32, ops: Vec<Op>) -> Result<(), TestCaseError> {
    let store = InMemoryStore::new();
    let clock = ManualClock::new(test_clock().now());
    let event = fixtures::upcoming_event(&clock, capacity);
    store.seed_event(event.clone()).await;
    let service = BookingService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(clock.clone()),
    );

    let users = [UserId::new(), UserId::new(), UserId::new()];
    let mut made: Vec<(UserId, BookingId)> = Vec::new();

    for op in ops {
        let before = store.bookings_for_event(event.id).await;

        let outcome = match op {
            Op::Purchase { user, quantity } => {
                let result = service.purchase(users[user], event.id, quantity).await;
                if let Ok(booking) = &result {
                    made.push((booking.user_id, booking.id));
                }
                result.map(|_| ())
            }
            Op::Confirm { pick: i } => match pick(&made, i) {
                Some((user, id)) => service.confirm_payment(user, id).await.map(|_| ()),
                None => Ok(()),
            },
            Op::CancelPayment { pick: i } => match pick(&made, i) {
                Some((user, id)) => service.cancel_payment(user, id).await.map(|_| ()),
                None => Ok(()),
            },
            Op::CancelBooking { pick: i } => match pick(&made, i) {
                Some((user, id)) => service.cancel_booking(user, id).await.map(|_| ()),
                None => Ok(()),
            },
            Op::Advance { hours } => {
                clock.advance(Duration::hours(hours));
                Ok(())
            }
        };

        let after = store.bookings_for_event(event.id).await;
        prop_assert!(held(&after) <= capacity);
        prop_assert_eq!(
            service.available_seats(event.id).await.unwrap(),
            capacity - held(&after)
        );
        prop_assert!(after.iter().all(|b| {
            BookingState::from_parts(b.state.status(), b.state.payment_status()).is_some()
        }), "every booking must be in a valid state");

        if let Err(error) = outcome {
            prop_assert!(!error.is_retryable());
            prop_assert_eq!(&before, &after, "failed operation changed state: {}", error);
            if let TicketingError::InsufficientInventory { available, .. } = error {
                prop_assert_eq!(available, capacity - held(&before));
            }
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_held_seats_never_exceed_capacity(
        capacity in 1u32..8,
        ops in prop::collection::vec(op(), 1..40),
    ) {
        tokio_test::block_on(run(capacity, ops))?;
    }
}
