//! Downstream projection of confirmed bookings.
//!
//! - [`OrderProjector`] turns a confirmed offer into an order and line item
//! - [`Projection`] trait for consumers of the booking event log
//! - [`ProjectionProcessor`] replays the log through registered projections

pub mod error;
pub mod order_projector;
pub mod processor;
pub mod projection;

#[cfg(test)]
mod testing;

pub use error::{ProjectionError, Result};
pub use order_projector::{OrderProjector, ProjectionOutcome, SkipReason};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
