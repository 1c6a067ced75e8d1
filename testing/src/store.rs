//! In-memory storage for fast, deterministic testing.
//!
//! [`InMemoryStore`] implements both [`EventCatalog`] and [`PersistenceGateway`] over
//! two `HashMap` tables. A unit of work holds the store's single lock for its whole
//! lifetime and writes to a private copy of the tables; [`UnitOfWork::commit`] swaps
//! the copy in, and dropping the unit of work throws it away. Units of work are
//! therefore fully serialized and atomic, which is stronger than any SQL isolation
//! level but exercises the same code paths in the services.
//!
//! Reads made through the store (not through a unit of work) wait for the lock, so a
//! task must never call them while it holds an open unit of work.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use ticketing_core::{
    Booking, BookingId, BookingState, Event, EventCatalog, EventId, EventSales, PageRequest,
    PersistenceGateway, StoreError, UnitOfWork, UserId,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Debug, Default)]
struct Tables {
    events: HashMap<EventId, Event>,
    bookings: HashMap<BookingId, Booking>,
}

impl Tables {
    fn bookings_for_event(&self, event_id: EventId) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .values()
            .filter(|b| b.event_id == event_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| (b.booked_at, b.id));
        bookings
    }

    fn name_taken(&self, name: &str, except: EventId) -> bool {
        self.events
            .values()
            .any(|e| e.id != except && e.name == name)
    }
}

/// In-memory event catalog and booking store.
///
/// Cloning is cheap and every clone sees the same tables.
///
/// # Example
///
/// ```
/// use ticketing_testing::{fixtures, test_clock, InMemoryStore};
/// use ticketing_core::EventCatalog;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryStore::new();
/// let event = fixtures::upcoming_event(&test_clock(), 10);
/// store.seed_event(event.clone()).await;
///
/// assert!(store.get_event(event.id).await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    failing_commits: Arc<AtomicU32>,
    commits: Arc<AtomicU64>,
}

impl InMemoryStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or overwrite) an event directly, bypassing units of work.
    pub async fn seed_event(&self, event: Event) {
        self.tables.lock().await.events.insert(event.id, event);
    }

    /// Insert (or overwrite) a booking directly, bypassing units of work.
    pub async fn seed_booking(&self, booking: Booking) {
        self.tables.lock().await.bookings.insert(booking.id, booking);
    }

    /// Committed snapshot of one booking
    pub async fn booking(&self, id: BookingId) -> Option<Booking> {
        self.tables.lock().await.bookings.get(&id).cloned()
    }

    /// Committed bookings of one event, oldest first
    pub async fn bookings_for_event(&self, event_id: EventId) -> Vec<Booking> {
        self.tables.lock().await.bookings_for_event(event_id)
    }

    /// Make the next `n` commits fail with [`StoreError::Conflict`].
    ///
    /// The failing units of work are rolled back, exactly like a serialization failure.
    pub fn fail_next_commits(&self, n: u32) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    /// Number of units of work committed successfully so far
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventCatalog for InMemoryStore {
    async fn get_event(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        Ok(self.tables.lock().await.events.get(&id).cloned())
    }

    async fn list_events(
        &self,
        page: PageRequest,
        search: Option<&str>,
    ) -> Result<(Vec<Event>, u64), StoreError> {
        let needle = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let tables = self.tables.lock().await;
        let mut events: Vec<Event> = tables
            .events
            .values()
            .filter(|e| {
                needle.as_ref().is_none_or(|n| {
                    e.name.to_lowercase().contains(n)
                        || e.description.to_lowercase().contains(n)
                        || e.location.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();
        drop(tables);

        events.sort_by_key(|e| (e.starts_at, e.id));
        let total = events.len() as u64;
        let items = events
            .into_iter()
            .skip(page.offset_usize())
            .take(page.page_size() as usize)
            .collect();
        Ok((items, total))
    }

    async fn all_events(&self) -> Result<Vec<Event>, StoreError> {
        let mut events: Vec<Event> = self.tables.lock().await.events.values().cloned().collect();
        events.sort_by_key(|e| (e.starts_at, e.id));
        Ok(events)
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryUnitOfWork {
            guard,
            working,
            failing_commits: Arc::clone(&self.failing_commits),
            commits: Arc::clone(&self.commits),
        }))
    }

    async fn find_booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        Ok(self.booking(id).await)
    }

    async fn list_bookings_for_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<(Vec<Booking>, u64), StoreError> {
        let tables = self.tables.lock().await;
        let bookings = tables.bookings.values().filter(|b| b.user_id == user_id).cloned().collect();
        drop(tables);
        Ok(newest_first_page(bookings, page))
    }

    async fn list_bookings(&self, page: PageRequest) -> Result<(Vec<Booking>, u64), StoreError> {
        let bookings = self.tables.lock().await.bookings.values().cloned().collect();
        Ok(newest_first_page(bookings, page))
    }

    async fn sales_by_event(&self) -> Result<Vec<EventSales>, StoreError> {
        let tables = self.tables.lock().await;
        let mut sales: HashMap<EventId, EventSales> = HashMap::new();
        for booking in tables.bookings.values() {
            let entry = sales.entry(booking.event_id).or_insert_with(|| EventSales {
                event_id: booking.event_id,
                ..EventSales::default()
            });
            entry.bookings += 1;
            let seats = u64::from(booking.quantity.value());
            match booking.state {
                BookingState::Reserved => entry.reserved_seats += seats,
                BookingState::Confirmed => {
                    entry.confirmed_seats += seats;
                    entry.confirmed_revenue = entry.confirmed_revenue.saturating_add(booking.subtotal);
                }
                BookingState::Cancelled => {}
            }
        }
        drop(tables);

        let mut sales: Vec<EventSales> = sales.into_values().collect();
        sales.sort_by_key(|s| s.event_id);
        Ok(sales)
    }
}

fn newest_first_page(mut bookings: Vec<Booking>, page: PageRequest) -> (Vec<Booking>, u64) {
    bookings.sort_by(|a, b| b.booked_at.cmp(&a.booked_at).then(a.id.cmp(&b.id)));
    let total = bookings.len() as u64;
    let items = bookings
        .into_iter()
        .skip(page.offset_usize())
        .take(page.page_size() as usize)
        .collect();
    (items, total)
}

/// Unit of work over [`InMemoryStore`].
///
/// Holds the store lock until it is committed, rolled back or dropped.
#[derive(Debug)]
pub struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    failing_commits: Arc<AtomicU32>,
    commits: Arc<AtomicU64>,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn lock_event(&mut self, id: EventId) -> Result<Option<Event>, StoreError> {
        Ok(self.working.events.get(&id).cloned())
    }

    async fn read_bookings_for_event(&mut self, event_id: EventId) -> Result<Vec<Booking>, StoreError> {
        Ok(self.working.bookings_for_event(event_id))
    }

    async fn lock_booking(&mut self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        Ok(self.working.bookings.get(&id).cloned())
    }

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), StoreError> {
        if !self.working.events.contains_key(&booking.event_id) {
            return Err(StoreError::Database(format!(
                "booking {} references unknown event {}",
                booking.id, booking.event_id
            )));
        }
        if self.working.bookings.contains_key(&booking.id) {
            return Err(StoreError::Duplicate(format!("booking {} already exists", booking.id)));
        }
        self.working.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn update_booking_state(
        &mut self,
        id: BookingId,
        state: BookingState,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let booking = self
            .working
            .bookings
            .get_mut(&id)
            .ok_or_else(|| StoreError::Database(format!("booking {id} not found")))?;
        booking.state = state;
        booking.updated_at = updated_at;
        Ok(())
    }

    async fn insert_event(&mut self, event: &Event) -> Result<(), StoreError> {
        if self.working.events.contains_key(&event.id) {
            return Err(StoreError::Duplicate(format!("event {} already exists", event.id)));
        }
        if self.working.name_taken(&event.name, event.id) {
            return Err(StoreError::Duplicate(format!("event name '{}' is taken", event.name)));
        }
        self.working.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn update_event(&mut self, event: &Event) -> Result<(), StoreError> {
        if !self.working.events.contains_key(&event.id) {
            return Err(StoreError::Database(format!("event {} not found", event.id)));
        }
        if self.working.name_taken(&event.name, event.id) {
            return Err(StoreError::Duplicate(format!("event name '{}' is taken", event.name)));
        }
        self.working.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn delete_event(&mut self, id: EventId) -> Result<(), StoreError> {
        if self.working.bookings.values().any(|b| b.event_id == id) {
            return Err(StoreError::Database(format!("event {id} is still referenced by bookings")));
        }
        self.working.events.remove(&id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let Self {
            mut guard,
            working,
            failing_commits,
            commits,
        } = *self;

        let injected = failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            tracing::debug!("in-memory commit failed by injection");
            return Err(StoreError::Conflict("injected commit conflict".to_string()));
        }

        *guard = working;
        commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
