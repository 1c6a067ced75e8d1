//! Sales reports.
//!
//! Figures are computed from committed booking rows, grouped per event by the store.
//! "Sold" means `Confirmed`; revenue is the sum of the subtotals frozen at purchase.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use ticketing_core::{EventCatalog, EventId, EventSales, EventStatus, Money, PersistenceGateway};

/// Events per lifecycle status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Events open for purchase
    pub upcoming: u64,
    /// Events in progress
    pub ongoing: u64,
    /// Finished events
    pub completed: u64,
}

impl StatusCounts {
    fn add(&mut self, status: EventStatus) {
        match status {
            EventStatus::Upcoming => self.upcoming += 1,
            EventStatus::Ongoing => self.ongoing += 1,
            EventStatus::Completed => self.completed += 1,
        }
    }
}

/// Whole-catalog totals
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryReport {
    /// Events in the catalog
    pub total_events: u64,
    /// Booking rows of any state
    pub total_bookings: u64,
    /// Σ quantity of confirmed bookings
    pub tickets_sold: u64,
    /// Σ subtotal of confirmed bookings
    pub revenue: Money,
    /// Events by status
    pub events_by_status: StatusCounts,
}

/// Per-event sales figures
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventReport {
    /// Event
    pub event_id: EventId,
    /// Event name
    pub event_name: String,
    /// Total seats
    pub capacity: u32,
    /// Confirmed seats
    pub tickets_sold: u64,
    /// Reserved + confirmed seats
    pub seats_held: u64,
    /// Confirmed revenue
    pub revenue: Money,
    /// `tickets_sold / capacity × 100`
    pub occupancy_rate: f64,
}

/// Read-only sales reporting over the catalog and booking store.
#[derive(Clone)]
pub struct ReportService {
    catalog: Arc<dyn EventCatalog>,
    gateway: Arc<dyn PersistenceGateway>,
}

impl ReportService {
    /// Create a report service.
    #[must_use]
    pub fn new(catalog: Arc<dyn EventCatalog>, gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self { catalog, gateway }
    }

    /// Totals across the whole catalog.
    ///
    /// # Errors
    ///
    /// Returns a store failure if events or sales cannot be read.
    #[tracing::instrument(skip(self))]
    pub async fn summary(&self) -> Result<SummaryReport> {
        let events = self.catalog.all_events().await?;
        let sales = self.gateway.sales_by_event().await?;

        let mut report = SummaryReport {
            total_events: events.len() as u64,
            ..SummaryReport::default()
        };
        for event in &events {
            report.events_by_status.add(event.status);
        }
        for figures in &sales {
            report.total_bookings += figures.bookings;
            report.tickets_sold += figures.confirmed_seats;
            report.revenue = report.revenue.saturating_add(figures.confirmed_revenue);
        }

        tracing::debug!(
            total_events = report.total_events,
            tickets_sold = report.tickets_sold,
            "Summary report computed"
        );
        Ok(report)
    }

    /// One report per event, in catalog order.
    ///
    /// # Errors
    ///
    /// Returns a store failure if events or sales cannot be read.
    #[tracing::instrument(skip(self))]
    pub async fn event_reports(&self) -> Result<Vec<EventReport>> {
        let events = self.catalog.all_events().await?;
        let sales: HashMap<EventId, EventSales> = self
            .gateway
            .sales_by_event()
            .await?
            .into_iter()
            .map(|s| (s.event_id, s))
            .collect();

        Ok(events
            .into_iter()
            .map(|event| {
                let figures = sales.get(&event.id).cloned().unwrap_or_default();
                let capacity = event.capacity.value();
                EventReport {
                    event_id: event.id,
                    event_name: event.name,
                    capacity,
                    tickets_sold: figures.confirmed_seats,
                    seats_held: figures.reserved_seats + figures.confirmed_seats,
                    revenue: figures.confirmed_revenue,
                    occupancy_rate: occupancy(figures.confirmed_seats, capacity),
                }
            })
            .collect())
    }
}

#[allow(clippy::cast_precision_loss)]
fn occupancy(sold: u64, capacity: u32) -> f64 {
    if capacity == 0 {
        return 0.0;
    }
    sold as f64 / f64::from(capacity) * 100.0
}
