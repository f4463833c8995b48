//! Persistence for the booking finalization core.
//!
//! - [`OfferStore`]: booking offers with atomic conditional transitions
//! - [`EventLog`]: append-only booking event log
//! - [`OrderLedger`]: downstream orders and line items
//! - [`WebhookReceipts`]: payment-provider deliveries already processed
//!
//! Each trait has an in-memory and a PostgreSQL implementation.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

#[cfg(test)]
mod testing;

pub use error::{Result, StoreError};
pub use event::{EventId, EventRecord};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use query::EventQuery;
pub use store::{
    BookingStore, EventLog, EventLogExt, EventStream, OfferStore, OrderLedger, WebhookReceipts,
};
