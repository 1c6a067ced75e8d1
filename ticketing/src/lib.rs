//! Event Ticketing - inventory and booking lifecycle engine
//!
//! Sells a finite number of seats per event and tracks every booking from purchase
//! through payment to cancellation without ever overselling. It provides:
//!
//! - **Inventory Ledger**: availability derived from booking rows, checked and written
//!   in the same unit of work under the event lock
//! - **Booking State Machine**: the only legal moves of a booking's joint
//!   (status, payment) state, plus the event start-time guard
//! - **Booking Service**: purchase, confirm payment, cancel payment, cancel booking and
//!   ownership-checked reads
//! - **Catalog and reports**: event administration and sales figures
//!
//! # Architecture
//!
//! ```text
//!   BookingService ──┬── InventoryLedger ──┐
//!                    └── BookingLifecycle  │
//!                                          ▼
//!   EventCatalogService ──────────► UnitOfWork (begin / commit / rollback)
//!   ReportService ─────────────────► EventCatalog + PersistenceGateway
//!                                          │
//!                         ┌────────────────┴────────────────┐
//!                   PostgresStore                      InMemoryStore
//!              (row locks, SQLSTATE mapping)      (serialized, for tests)
//! ```
//!
//! ## Seat arithmetic
//!
//! ```text
//! available = capacity - Σ quantity of Reserved and Confirmed bookings
//!
//! if requested > available {
//!     return InsufficientInventory // one buyer wins the last seats, the rest fail cleanly
//! }
//! ```
//!
//! ## Booking lifecycle
//!
//! ```text
//! Purchase       → Reserved  (Reserved, Pending)
//! ConfirmPayment → Confirmed (Confirmed, Paid)              before the event starts
//! CancelPayment  → Cancelled (Cancelled, PaymentCancelled)  from Reserved, any time
//! CancelBooking  → Cancelled (Cancelled, PaymentCancelled)  from Confirmed, before start
//! ```
//!
//! Contention surfaces as [`TicketingError::TransientConflict`]; wrap an operation in
//! [`retry::retry_transient`] to resubmit it.

#![forbid(unsafe_code)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod inventory;
pub mod lifecycle;
pub mod metrics;
pub mod reports;
pub mod retry;
pub mod service;
pub mod telemetry;

pub use catalog::{EventAvailability, EventCatalogService};
pub use config::Config;
pub use error::{ErrorKind, Result, TicketingError};
pub use inventory::{InventoryLedger, Release, Reservation, SeatCount};
pub use lifecycle::{BookingLifecycle, LifecycleCommand, LifecycleError, Schedule};
pub use reports::{EventReport, ReportService, StatusCounts, SummaryReport};
pub use retry::{RetryPolicy, retry_transient};
pub use service::BookingService;
