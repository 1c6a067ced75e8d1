//! `PostgresStore`: catalog reads, booking queries and transactional units of work.

use crate::rows::{
    booking_from_row, cents, contains_pattern, event_from_row, map_sqlx_error, sales_from_row,
    seats,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::fmt;
use std::time::Duration;
use ticketing_core::{
    Booking, BookingId, BookingState, Event, EventCatalog, EventId, EventSales, PageRequest,
    PersistenceGateway, StoreError, UnitOfWork, UserId,
};

/// Transaction isolation used for every unit of work.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// PostgreSQL default; correctness comes from `SELECT … FOR UPDATE` row locks.
    #[default]
    ReadCommitted,
    /// Full serializability; expect more `40001` conflicts under load.
    Serializable,
}

impl IsolationLevel {
    /// Configuration string (`read_committed` / `serializable`)
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ReadCommitted => "read_committed",
            Self::Serializable => "serializable",
        }
    }

    /// Parse a configuration string (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read_committed" | "read-committed" => Some(Self::ReadCommitted),
            "serializable" => Some(Self::Serializable),
            _ => None,
        }
    }

    const fn set_transaction_sql(self) -> &'static str {
        match self {
            Self::ReadCommitted => "SET TRANSACTION ISOLATION LEVEL READ COMMITTED",
            Self::Serializable => "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection pool and transaction settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostgresSettings {
    /// Maximum pool size
    pub max_connections: u32,
    /// Connections kept open when idle
    pub min_connections: u32,
    /// How long to wait for a pooled connection
    pub connect_timeout: Duration,
    /// `lock_timeout` applied to every unit of work
    pub lock_timeout: Duration,
    /// Isolation level applied to every unit of work
    pub isolation: IsolationLevel,
}

impl Default for PostgresSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            connect_timeout: Duration::from_secs(30),
            lock_timeout: Duration::from_millis(5_000),
            isolation: IsolationLevel::ReadCommitted,
        }
    }
}

/// PostgreSQL implementation of [`EventCatalog`] and [`PersistenceGateway`].
///
/// # Example
///
/// ```no_run
/// use ticketing_postgres::{PostgresSettings, PostgresStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = PostgresStore::connect("postgres://localhost/ticketing", &PostgresSettings::default()).await?;
/// store.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
    isolation: IsolationLevel,
    lock_timeout: Duration,
}

impl PostgresStore {
    /// Open a connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the database is unreachable.
    pub async fn connect(database_url: &str, settings: &PostgresSettings) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;

        tracing::info!(
            max_connections = settings.max_connections,
            isolation = %settings.isolation,
            "Connected to PostgreSQL"
        );

        Ok(Self {
            pool,
            isolation: settings.isolation,
            lock_timeout: settings.lock_timeout,
        })
    }

    /// Wrap an existing pool with default transaction settings.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        let defaults = PostgresSettings::default();
        Self {
            pool,
            isolation: defaults.isolation,
            lock_timeout: defaults.lock_timeout,
        }
    }

    /// Use `isolation` for every subsequent unit of work.
    #[must_use]
    pub const fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    /// Use `lock_timeout` for every subsequent unit of work.
    #[must_use]
    pub const fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if migrations fail.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    async fn fetch_bookings(
        &self,
        user_id: Option<UserId>,
        page: PageRequest,
    ) -> Result<(Vec<Booking>, u64), StoreError> {
        let user = user_id.map(|u| *u.as_uuid());
        let offset = i64::try_from(page.offset())
            .map_err(|_| StoreError::Database("page offset out of range".to_string()))?;

        let rows = sqlx::query(
            r"
            SELECT id, user_id, event_id, quantity, unit_price_cents, subtotal_cents,
                   status, payment_status, booked_at, updated_at
            FROM bookings
            WHERE ($1::UUID IS NULL OR user_id = $1)
            ORDER BY booked_at DESC, id
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(user)
        .bind(i64::from(page.page_size()))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to list bookings", &e))?;

        let (total,): (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*)
            FROM bookings
            WHERE ($1::UUID IS NULL OR user_id = $1)
            ",
        )
        .bind(user)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to count bookings", &e))?;

        let bookings = rows.iter().map(booking_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok((bookings, u64::try_from(total).unwrap_or(0)))
    }
}

#[async_trait]
impl EventCatalog for PostgresStore {
    async fn get_event(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT id, name, description, location, starts_at, capacity, price_cents,
                   status, created_at, updated_at
            FROM events
            WHERE id = $1
            ",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to get event", &e))?;

        row.as_ref().map(event_from_row).transpose()
    }

    async fn list_events(
        &self,
        page: PageRequest,
        search: Option<&str>,
    ) -> Result<(Vec<Event>, u64), StoreError> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(contains_pattern);
        let offset = i64::try_from(page.offset())
            .map_err(|_| StoreError::Database("page offset out of range".to_string()))?;

        let rows = sqlx::query(
            r"
            SELECT id, name, description, location, starts_at, capacity, price_cents,
                   status, created_at, updated_at
            FROM events
            WHERE ($1::TEXT IS NULL
                   OR name ILIKE $1 OR description ILIKE $1 OR location ILIKE $1)
            ORDER BY starts_at, id
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(pattern.as_deref())
        .bind(i64::from(page.page_size()))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to list events", &e))?;

        let (total,): (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*)
            FROM events
            WHERE ($1::TEXT IS NULL
                   OR name ILIKE $1 OR description ILIKE $1 OR location ILIKE $1)
            ",
        )
        .bind(pattern.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to count events", &e))?;

        let events = rows.iter().map(event_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok((events, u64::try_from(total).unwrap_or(0)))
    }

    async fn all_events(&self) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT id, name, description, location, starts_at, capacity, price_cents,
                   status, created_at, updated_at
            FROM events
            ORDER BY starts_at, id
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to load events", &e))?;

        rows.iter().map(event_from_row).collect()
    }
}

#[async_trait]
impl PersistenceGateway for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("Failed to start transaction", &e))?;

        // Must run before any other statement in the transaction.
        sqlx::query(self.isolation.set_transaction_sql())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to set isolation level", &e))?;

        // SET does not accept bind parameters; the value is an integer we format ourselves.
        let lock_timeout = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis());
        sqlx::query(&lock_timeout)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to set lock timeout", &e))?;

        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn find_booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, event_id, quantity, unit_price_cents, subtotal_cents,
                   status, payment_status, booked_at, updated_at
            FROM bookings
            WHERE id = $1
            ",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to get booking", &e))?;

        row.as_ref().map(booking_from_row).transpose()
    }

    async fn list_bookings_for_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<(Vec<Booking>, u64), StoreError> {
        self.fetch_bookings(Some(user_id), page).await
    }

    async fn list_bookings(&self, page: PageRequest) -> Result<(Vec<Booking>, u64), StoreError> {
        self.fetch_bookings(None, page).await
    }

    async fn sales_by_event(&self) -> Result<Vec<EventSales>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT event_id,
                   COUNT(*) AS bookings,
                   COALESCE(SUM(quantity) FILTER (WHERE status = 'reserved'), 0)::BIGINT
                       AS reserved_seats,
                   COALESCE(SUM(quantity) FILTER (WHERE status = 'confirmed'), 0)::BIGINT
                       AS confirmed_seats,
                   COALESCE(SUM(subtotal_cents) FILTER (WHERE status = 'confirmed'), 0)::BIGINT
                       AS confirmed_revenue
            FROM bookings
            GROUP BY event_id
            ORDER BY event_id
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to aggregate sales", &e))?;

        rows.iter().map(sales_from_row).collect()
    }
}

/// One PostgreSQL transaction.
///
/// Dropping it without calling [`UnitOfWork::commit`] rolls the transaction back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_event(&mut self, id: EventId) -> Result<Option<Event>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT id, name, description, location, starts_at, capacity, price_cents,
                   status, created_at, updated_at
            FROM events
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to lock event", &e))?;

        row.as_ref().map(event_from_row).transpose()
    }

    async fn read_bookings_for_event(&mut self, event_id: EventId) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, event_id, quantity, unit_price_cents, subtotal_cents,
                   status, payment_status, booked_at, updated_at
            FROM bookings
            WHERE event_id = $1
            ORDER BY booked_at, id
            ",
        )
        .bind(*event_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to read bookings", &e))?;

        rows.iter().map(booking_from_row).collect()
    }

    async fn lock_booking(&mut self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, event_id, quantity, unit_price_cents, subtotal_cents,
                   status, payment_status, booked_at, updated_at
            FROM bookings
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to lock booking", &e))?;

        row.as_ref().map(booking_from_row).transpose()
    }

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO bookings (
                id, user_id, event_id, quantity, unit_price_cents, subtotal_cents,
                status, payment_status, booked_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(*booking.id.as_uuid())
        .bind(*booking.user_id.as_uuid())
        .bind(*booking.event_id.as_uuid())
        .bind(seats(booking.quantity.value())?)
        .bind(cents(booking.unit_price)?)
        .bind(cents(booking.subtotal)?)
        .bind(booking.state.status().as_str())
        .bind(booking.state.payment_status().as_str())
        .bind(booking.booked_at)
        .bind(booking.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to insert booking", &e))?;

        Ok(())
    }

    async fn update_booking_state(
        &mut self,
        id: BookingId,
        state: BookingState,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"
            UPDATE bookings
            SET status = $2, payment_status = $3, updated_at = $4
            WHERE id = $1
            ",
        )
        .bind(*id.as_uuid())
        .bind(state.status().as_str())
        .bind(state.payment_status().as_str())
        .bind(updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to update booking", &e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Database(format!("booking {id} not found")));
        }
        Ok(())
    }

    async fn insert_event(&mut self, event: &Event) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO events (
                id, name, description, location, starts_at, capacity, price_cents,
                status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(*event.id.as_uuid())
        .bind(&event.name)
        .bind(&event.description)
        .bind(&event.location)
        .bind(event.starts_at)
        .bind(seats(event.capacity.value())?)
        .bind(cents(event.price)?)
        .bind(event.status.as_str())
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to insert event", &e))?;

        Ok(())
    }

    async fn update_event(&mut self, event: &Event) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"
            UPDATE events
            SET name = $2, description = $3, location = $4, starts_at = $5,
                capacity = $6, price_cents = $7, status = $8, updated_at = $9
            WHERE id = $1
            ",
        )
        .bind(*event.id.as_uuid())
        .bind(&event.name)
        .bind(&event.description)
        .bind(&event.location)
        .bind(event.starts_at)
        .bind(seats(event.capacity.value())?)
        .bind(cents(event.price)?)
        .bind(event.status.as_str())
        .bind(event.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to update event", &e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Database(format!("event {} not found", event.id)));
        }
        Ok(())
    }

    async fn delete_event(&mut self, id: EventId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to delete event", &e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("Failed to commit transaction", &e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("Failed to roll back transaction", &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolation_level_parses_config_strings() {
        assert_eq!(IsolationLevel::parse("serializable"), Some(IsolationLevel::Serializable));
        assert_eq!(IsolationLevel::parse(" READ_COMMITTED "), Some(IsolationLevel::ReadCommitted));
        assert_eq!(IsolationLevel::parse("snapshot"), None);
    }

    #[test]
    fn default_settings_use_row_locks_under_read_committed() {
        let settings = PostgresSettings::default();
        assert_eq!(settings.isolation, IsolationLevel::ReadCommitted);
        assert_eq!(settings.lock_timeout, Duration::from_millis(5_000));
    }
}
