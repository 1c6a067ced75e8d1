//! Booking State Machine.
//!
//! The joint (status, payment) state of a booking moves through this table only:
//!
//! | From | Command | To |
//! |---|---|---|
//! | (none) | Purchase | Reserved (Reserved, Pending) |
//! | Reserved | `ConfirmPayment` | Confirmed (Confirmed, Paid) |
//! | Reserved | `CancelPayment` | Cancelled (Cancelled, `PaymentCancelled`) |
//! | Confirmed | `CancelBooking` | Cancelled (Cancelled, `PaymentCancelled`) |
//!
//! Anything else is an illegal transition. `ConfirmPayment` and `CancelBooking` are
//! additionally refused once the event's scheduled start has been reached. The table is
//! checked before the schedule, so a command that is illegal anyway reports
//! `IllegalTransition` regardless of time.
//!
//! Purchase is not a command: a booking comes into existence in
//! [`BookingLifecycle::initial`].

use crate::error::TicketingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use ticketing_core::{BookingId, BookingState, EventId, Transition};

/// Commands accepted by an existing booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleCommand {
    /// Payment captured
    ConfirmPayment,
    /// Payment abandoned before confirmation
    CancelPayment,
    /// Paid booking cancelled by its owner
    CancelBooking,
}

impl LifecycleCommand {
    /// Every command
    pub const ALL: [Self; 3] = [Self::ConfirmPayment, Self::CancelPayment, Self::CancelBooking];

    /// Whether the command is refused once the event has started
    #[must_use]
    pub const fn requires_future_event(self) -> bool {
        matches!(self, Self::ConfirmPayment | Self::CancelBooking)
    }

    /// Metric / log label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfirmPayment => "confirm_payment",
            Self::CancelPayment => "cancel_payment",
            Self::CancelBooking => "cancel_booking",
        }
    }
}

impl fmt::Display for LifecycleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ConfirmPayment => "confirm payment for",
            Self::CancelPayment => "cancel payment for",
            Self::CancelBooking => "cancel",
        };
        f.write_str(label)
    }
}

/// Time context a transition is evaluated in.
///
/// `event_starts_at` must come from the catalog's current schedule, not a cached copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Schedule {
    /// Evaluation instant
    pub now: DateTime<Utc>,
    /// The booked event's scheduled start
    pub event_starts_at: DateTime<Utc>,
}

impl Schedule {
    /// Create a schedule
    #[must_use]
    pub const fn new(now: DateTime<Utc>, event_starts_at: DateTime<Utc>) -> Self {
        Self { now, event_starts_at }
    }

    /// True once `now` has reached the scheduled start
    #[must_use]
    pub fn event_started(&self) -> bool {
        self.now >= self.event_starts_at
    }
}

/// Why a command was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    /// State/command pair not in the table
    #[error("cannot {command} a booking in state {from}")]
    IllegalTransition {
        /// Current state
        from: BookingState,
        /// Rejected command
        command: LifecycleCommand,
    },
    /// Time guard failed
    #[error("event already started at {starts_at}")]
    EventAlreadyStarted {
        /// Scheduled start
        starts_at: DateTime<Utc>,
    },
}

impl LifecycleError {
    /// Attach the booking and event identities.
    #[must_use]
    pub const fn into_ticketing_error(self, booking_id: BookingId, event_id: EventId) -> TicketingError {
        match self {
            Self::IllegalTransition { from, command } => TicketingError::IllegalTransition {
                booking_id,
                from,
                command,
            },
            Self::EventAlreadyStarted { starts_at } => {
                TicketingError::EventAlreadyStarted { event_id, starts_at }
            }
        }
    }
}

/// The booking state machine.
#[derive(Clone, Copy, Debug, Default)]
pub struct BookingLifecycle;

impl BookingLifecycle {
    /// State of a freshly purchased booking
    #[must_use]
    pub const fn initial() -> BookingState {
        BookingState::Reserved
    }

    /// Table lookup, ignoring time
    #[must_use]
    pub const fn target(state: BookingState, command: LifecycleCommand) -> Option<BookingState> {
        match (state, command) {
            (BookingState::Reserved, LifecycleCommand::ConfirmPayment) => Some(BookingState::Confirmed),
            (BookingState::Reserved, LifecycleCommand::CancelPayment)
            | (BookingState::Confirmed, LifecycleCommand::CancelBooking) => Some(BookingState::Cancelled),
            _ => None,
        }
    }
}

impl Transition for BookingLifecycle {
    type State = BookingState;
    type Command = LifecycleCommand;
    type Environment = Schedule;
    type Error = LifecycleError;

    fn transition(
        &self,
        state: &BookingState,
        command: LifecycleCommand,
        schedule: &Schedule,
    ) -> Result<BookingState, LifecycleError> {
        let next = Self::target(*state, command).ok_or(LifecycleError::IllegalTransition {
            from: *state,
            command,
        })?;

        if command.requires_future_event() && schedule.event_started() {
            return Err(LifecycleError::EventAlreadyStarted {
                starts_at: schedule.event_starts_at,
            });
        }

        Ok(next)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use ticketing_testing::{TransitionTest, test_clock};
    use ticketing_core::environment::Clock;

    fn before_start() -> Schedule {
        let now = test_clock().now();
        Schedule::new(now, now + Duration::days(1))
    }

    fn after_start() -> Schedule {
        let now = test_clock().now();
        Schedule::new(now, now - Duration::minutes(1))
    }

    #[test]
    fn purchase_starts_reserved_and_pending() {
        let state = BookingLifecycle::initial();
        assert_eq!(state, BookingState::Reserved);
        assert!(state.holds_seats());
    }

    #[test]
    fn confirm_payment_moves_to_confirmed() {
        TransitionTest::new(BookingLifecycle)
            .with_env(before_start())
            .given_state(BookingState::Reserved)
            .when_command(LifecycleCommand::ConfirmPayment)
            .then_state(|state| assert_eq!(*state, BookingState::Confirmed))
            .run();
    }

    #[test]
    fn cancel_payment_moves_to_cancelled() {
        TransitionTest::new(BookingLifecycle)
            .with_env(before_start())
            .given_state(BookingState::Reserved)
            .when_command(LifecycleCommand::CancelPayment)
            .then_state(|state| assert_eq!(*state, BookingState::Cancelled))
            .run();
    }

    #[test]
    fn cancel_booking_moves_confirmed_to_cancelled() {
        TransitionTest::new(BookingLifecycle)
            .with_env(before_start())
            .given_state(BookingState::Confirmed)
            .when_command(LifecycleCommand::CancelBooking)
            .then_state(|state| assert_eq!(*state, BookingState::Cancelled))
            .run();
    }

    #[test]
    fn cancel_booking_requires_confirmation() {
        TransitionTest::new(BookingLifecycle)
            .with_env(before_start())
            .given_state(BookingState::Reserved)
            .when_command(LifecycleCommand::CancelBooking)
            .then_error(|error| {
                assert!(matches!(error, LifecycleError::IllegalTransition { .. }));
            })
            .run();
    }

    #[test]
    fn cancelled_is_terminal() {
        for command in LifecycleCommand::ALL {
            TransitionTest::new(BookingLifecycle)
                .with_env(before_start())
                .given_state(BookingState::Cancelled)
                .when_command(command)
                .then_error(move |error| {
                    assert_eq!(
                        *error,
                        LifecycleError::IllegalTransition { from: BookingState::Cancelled, command }
                    );
                })
                .run();
        }
    }

    #[test]
    fn confirm_payment_after_start_is_refused() {
        TransitionTest::new(BookingLifecycle)
            .with_env(after_start())
            .given_state(BookingState::Reserved)
            .when_command(LifecycleCommand::ConfirmPayment)
            .then_error(|error| {
                assert!(matches!(error, LifecycleError::EventAlreadyStarted { .. }));
            })
            .run();
    }

    #[test]
    fn start_time_itself_counts_as_started() {
        let now = test_clock().now();
        TransitionTest::new(BookingLifecycle)
            .with_env(Schedule::new(now, now))
            .given_state(BookingState::Confirmed)
            .when_command(LifecycleCommand::CancelBooking)
            .then_error(|error| {
                assert!(matches!(error, LifecycleError::EventAlreadyStarted { .. }));
            })
            .run();
    }

    #[test]
    fn cancel_payment_is_not_time_guarded() {
        TransitionTest::new(BookingLifecycle)
            .with_env(after_start())
            .given_state(BookingState::Reserved)
            .when_command(LifecycleCommand::CancelPayment)
            .then_state(|state| assert_eq!(*state, BookingState::Cancelled))
            .run();
    }

    #[test]
    fn illegal_pair_wins_over_time_guard() {
        TransitionTest::new(BookingLifecycle)
            .with_env(after_start())
            .given_state(BookingState::Cancelled)
            .when_command(LifecycleCommand::ConfirmPayment)
            .then_error(|error| {
                assert!(matches!(error, LifecycleError::IllegalTransition { .. }));
            })
            .run();
    }

    fn any_command() -> impl Strategy<Value = LifecycleCommand> {
        prop::sample::select(LifecycleCommand::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_command_sequences_follow_the_table(
            commands in prop::collection::vec(any_command(), 0..12),
            started in any::<bool>(),
        ) {
            let schedule = if started { after_start() } else { before_start() };
            let machine = BookingLifecycle;
            let mut state = BookingLifecycle::initial();
            let mut accepted = 0;

            for command in commands {
                let expected = BookingLifecycle::target(state, command)
                    .filter(|_| !(command.requires_future_event() && started));
                match machine.transition(&state, command, &schedule) {
                    Ok(next) => {
                        prop_assert_eq!(Some(next), expected);
                        state = next;
                        accepted += 1;
                    }
                    Err(_) => prop_assert_eq!(expected, None),
                }
                prop_assert!(BookingState::from_parts(state.status(), state.payment_status()).is_some());
            }

            // Reserved → Confirmed → Cancelled is the longest path.
            prop_assert!(accepted <= 2);
        }
    }
}
