//! `PostgreSQL` storage for the ticketing booking engine.
//!
//! [`PostgresStore`] implements the `EventCatalog` and `PersistenceGateway` traits from
//! `ticketing-core` with sqlx:
//!
//! - Every unit of work is one database transaction (`READ COMMITTED` by default,
//!   optionally `SERIALIZABLE`) with a bounded `lock_timeout`
//! - `lock_event` / `lock_booking` take `SELECT … FOR UPDATE` row locks, so purchases of
//!   one event and transitions of one booking serialize
//! - Serialization failures, deadlocks and lock timeouts surface as
//!   `StoreError::Conflict` so callers can retry the whole unit of work
//! - Migrations are embedded with `sqlx::migrate!`
//!
//! # Example
//!
//! ```ignore
//! use ticketing_postgres::{PostgresSettings, PostgresStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresStore::connect("postgres://localhost/ticketing", &PostgresSettings::default()).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod rows;
mod store;

pub use store::{IsolationLevel, PgUnitOfWork, PostgresSettings, PostgresStore};
