//! Strongly typed identifiers shared across the booking finalization crates.

mod ids;

pub use ids::{CompanyId, LineItemId, OfferId, OrderId, PartyId};
