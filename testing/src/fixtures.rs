//! Event fixtures.
//!
//! Start times are relative to the supplied clock so tests stay deterministic.

use chrono::Duration;
use ticketing_core::environment::Clock;
use ticketing_core::{Capacity, Event, EventDraft, EventId, Money};

/// Default ticket price used by fixtures ($25.00)
pub const DEFAULT_PRICE: Money = Money::from_cents(2_500);

/// A valid draft for an event starting seven days after `clock.now()`
#[must_use]
pub fn draft(clock: &impl Clock, name: &str, capacity: u32) -> EventDraft {
    EventDraft {
        name: name.to_string(),
        description: format!("{name} (fixture)"),
        location: "Main Hall".to_string(),
        starts_at: clock.now() + Duration::days(7),
        capacity: Capacity::new(capacity),
        price: DEFAULT_PRICE,
    }
}

/// An `Upcoming` event with the given name and capacity
#[must_use]
pub fn event_named(clock: &impl Clock, name: &str, capacity: u32) -> Event {
    Event::from_draft(EventId::new(), draft(clock, name, capacity), clock.now())
}

/// An `Upcoming` event with a generated name
#[must_use]
pub fn upcoming_event(clock: &impl Clock, capacity: u32) -> Event {
    let id = EventId::new();
    Event::from_draft(id, draft(clock, &format!("Event {id}"), capacity), clock.now())
}
