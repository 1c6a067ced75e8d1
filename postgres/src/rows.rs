//! Row decoding, parameter encoding and `sqlx` error mapping.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use ticketing_core::{
    Booking, BookingId, BookingState, BookingStatus, Capacity, Event, EventId, EventSales,
    EventStatus, Money, PaymentStatus, Quantity, StoreError, UserId,
};
use uuid::Uuid;

/// SQLSTATEs that mean "another transaction got in the way; try again".
///
/// `40001` serialization failure, `40P01` deadlock detected, `55P03` lock not available
/// (raised when `lock_timeout` expires).
const CONFLICT_CODES: [&str; 3] = ["40001", "40P01", "55P03"];

/// SQLSTATE for `unique_violation`
const UNIQUE_VIOLATION: &str = "23505";

/// Map a `sqlx` error to a [`StoreError`], classifying contention as retryable.
pub(crate) fn map_sqlx_error(context: &str, error: &sqlx::Error) -> StoreError {
    if let Some(db_error) = error.as_database_error() {
        let code = db_error.code();
        match code.as_deref() {
            Some(code) if CONFLICT_CODES.contains(&code) => {
                tracing::warn!(sqlstate = code, context, "Transaction conflict");
                metrics::counter!("ticketing_store_conflicts_total", "sqlstate" => code.to_string())
                    .increment(1);
                return StoreError::Conflict(format!("{context}: {db_error}"));
            }
            Some(UNIQUE_VIOLATION) => {
                return StoreError::Duplicate(format!("{context}: {db_error}"));
            }
            _ => {}
        }
    }
    StoreError::Database(format!("{context}: {error}"))
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Corrupt(format!("column {name}: {e}")))
}

fn money(cents: i64, name: &str) -> Result<Money, StoreError> {
    u64::try_from(cents)
        .map(Money::from_cents)
        .map_err(|_| StoreError::Corrupt(format!("{name} is negative: {cents}")))
}

/// Encode money for a `BIGINT` column.
pub(crate) fn cents(amount: Money) -> Result<i64, StoreError> {
    i64::try_from(amount.cents())
        .map_err(|_| StoreError::Database(format!("amount {amount} does not fit in BIGINT")))
}

/// Encode a seat count for an `INTEGER` column.
pub(crate) fn seats(value: u32) -> Result<i32, StoreError> {
    i32::try_from(value)
        .map_err(|_| StoreError::Database(format!("seat count {value} does not fit in INTEGER")))
}

/// Decode an `events` row.
pub(crate) fn event_from_row(row: &PgRow) -> Result<Event, StoreError> {
    let capacity: i32 = column(row, "capacity")?;
    let capacity = u32::try_from(capacity)
        .ok()
        .filter(|c| *c > 0)
        .ok_or_else(|| StoreError::Corrupt(format!("invalid capacity {capacity}")))?;

    let status: String = column(row, "status")?;
    let status = EventStatus::parse(&status)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown event status '{status}'")))?;

    Ok(Event {
        id: EventId::from_uuid(column::<Uuid>(row, "id")?),
        name: column(row, "name")?,
        description: column(row, "description")?,
        location: column(row, "location")?,
        starts_at: column::<DateTime<Utc>>(row, "starts_at")?,
        capacity: Capacity::new(capacity),
        price: money(column(row, "price_cents")?, "price_cents")?,
        status,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

/// Decode a `bookings` row, rejecting status pairs outside the lifecycle table.
pub(crate) fn booking_from_row(row: &PgRow) -> Result<Booking, StoreError> {
    let quantity: i32 = column(row, "quantity")?;
    let quantity = Quantity::try_from(i64::from(quantity))
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

    let status: String = column(row, "status")?;
    let payment: String = column(row, "payment_status")?;
    let state = BookingStatus::parse(&status)
        .zip(PaymentStatus::parse(&payment))
        .and_then(|(status, payment)| BookingState::from_parts(status, payment))
        .ok_or_else(|| {
            StoreError::Corrupt(format!("illegal booking state ({status}, {payment})"))
        })?;

    Ok(Booking {
        id: BookingId::from_uuid(column::<Uuid>(row, "id")?),
        user_id: UserId::from_uuid(column::<Uuid>(row, "user_id")?),
        event_id: EventId::from_uuid(column::<Uuid>(row, "event_id")?),
        quantity,
        unit_price: money(column(row, "unit_price_cents")?, "unit_price_cents")?,
        subtotal: money(column(row, "subtotal_cents")?, "subtotal_cents")?,
        booked_at: column(row, "booked_at")?,
        updated_at: column(row, "updated_at")?,
        state,
    })
}

/// Decode one row of the per-event sales aggregate.
pub(crate) fn sales_from_row(row: &PgRow) -> Result<EventSales, StoreError> {
    let count = |name: &str| -> Result<u64, StoreError> {
        let value: i64 = column(row, name)?;
        u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("{name} is negative: {value}")))
    };

    Ok(EventSales {
        event_id: EventId::from_uuid(column::<Uuid>(row, "event_id")?),
        bookings: count("bookings")?,
        reserved_seats: count("reserved_seats")?,
        confirmed_seats: count("confirmed_seats")?,
        confirmed_revenue: money(column(row, "confirmed_revenue")?, "confirmed_revenue")?,
    })
}

/// Build a case-insensitive `ILIKE` pattern matching `needle` anywhere.
///
/// `%`, `_` and `\` in the needle are matched literally.
pub(crate) fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
