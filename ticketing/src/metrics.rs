//! Business metrics for the booking engine.
//!
//! Recorded through the `metrics` facade; the binary installs the Prometheus exporter.
//! Without an installed recorder every call is a no-op, which is what tests rely on.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `ticketing_bookings_total{outcome}` - Purchase attempts by outcome (`reserved` or error code)
//! - `ticketing_tickets_reserved_total` - Seats granted to new bookings
//! - `ticketing_tickets_released_total` - Seats returned to the pool by cancellations
//! - `ticketing_payments_total{status}` - Payment transitions (`confirmed`, `cancelled`, `refunded`)
//! - `ticketing_payment_revenue_cents_total` - Confirmed revenue in cents
//! - `ticketing_transient_conflicts_total{operation}` - Operations aborted by write contention
//! - `ticketing_events_created_total` - Catalog events created
//!
//! ## Histograms
//! - `ticketing_purchase_duration_seconds` - End-to-end purchase latency

use metrics::{describe_counter, describe_histogram};
use std::time::Duration;

/// Initialize and register all business metrics descriptions.
///
/// This should be called once at application startup, before any metrics are recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "ticketing_bookings_total",
        "Purchase attempts by outcome (reserved, or the error code that rejected them)"
    );
    describe_counter!(
        "ticketing_tickets_reserved_total",
        "Seats granted to new bookings"
    );
    describe_counter!(
        "ticketing_tickets_released_total",
        "Seats returned to the pool by cancellations"
    );
    describe_counter!(
        "ticketing_payments_total",
        "Payment transitions by status (confirmed, cancelled, refunded)"
    );
    describe_counter!(
        "ticketing_payment_revenue_cents_total",
        "Revenue from confirmed payments in cents"
    );
    describe_counter!(
        "ticketing_transient_conflicts_total",
        "Operations aborted by concurrent-write contention"
    );
    describe_counter!(
        "ticketing_events_created_total",
        "Total number of catalog events created"
    );
    describe_histogram!(
        "ticketing_purchase_duration_seconds",
        "Time taken to evaluate and commit a purchase"
    );

    tracing::info!("Business metrics registered");
}

/// Record the outcome of one purchase attempt.
///
/// # Arguments
///
/// * `outcome` - `reserved` on success, otherwise the error code
/// * `seats` - Seats granted (0 when rejected)
/// * `elapsed` - Wall time of the attempt
pub fn record_purchase(outcome: &'static str, seats: u32, elapsed: Duration) {
    metrics::counter!("ticketing_bookings_total", "outcome" => outcome).increment(1);
    if seats > 0 {
        metrics::counter!("ticketing_tickets_reserved_total").increment(u64::from(seats));
    }
    metrics::histogram!("ticketing_purchase_duration_seconds").record(elapsed.as_secs_f64());
    tracing::debug!(outcome, seats, "Recorded purchase metric");
}

/// Record a confirmed payment.
///
/// # Arguments
///
/// * `amount_cents` - Booking subtotal in cents
pub fn record_payment_confirmed(amount_cents: u64) {
    metrics::counter!("ticketing_payments_total", "status" => "confirmed").increment(1);
    metrics::counter!("ticketing_payment_revenue_cents_total").increment(amount_cents);
    tracing::debug!(amount_cents, "Recorded payment_confirmed metric");
}

/// Record a payment abandoned before confirmation.
pub fn record_payment_cancelled() {
    metrics::counter!("ticketing_payments_total", "status" => "cancelled").increment(1);
    tracing::debug!("Recorded payment_cancelled metric");
}

/// Record a paid booking cancelled by its owner.
pub fn record_payment_refunded() {
    metrics::counter!("ticketing_payments_total", "status" => "refunded").increment(1);
    tracing::debug!("Recorded payment_refunded metric");
}

/// Record seats returned to the pool.
pub fn record_tickets_released(seats: u32) {
    if seats > 0 {
        metrics::counter!("ticketing_tickets_released_total").increment(u64::from(seats));
        tracing::debug!(seats, "Recorded tickets_released metric");
    }
}

/// Record an operation aborted by write contention.
///
/// # Arguments
///
/// * `operation` - Operation name (e.g. `purchase`, `confirm_payment`)
pub fn record_transient_conflict(operation: &'static str) {
    metrics::counter!("ticketing_transient_conflicts_total", "operation" => operation).increment(1);
    tracing::debug!(operation, "Recorded transient_conflict metric");
}

/// Record an event created.
pub fn record_event_created() {
    metrics::counter!("ticketing_events_created_total").increment(1);
    tracing::debug!("Recorded event_created metric");
}
