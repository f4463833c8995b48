//! Domain error types.

use thiserror::Error;

use crate::offer::OfferStatus;

/// Errors raised by booking offer rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OfferError {
    /// Commercial terms cannot change once payment has succeeded.
    #[error("Commercial terms are locked: offer {offer_id} is already paid")]
    TermsLocked { offer_id: String },

    /// The transition is not an edge of the lifecycle graph, or its guard failed.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: OfferStatus, to: OfferStatus },

    /// Currency code is not three ASCII letters.
    #[error("Invalid currency code: {code}")]
    InvalidCurrency { code: String },

    /// Amount is not a valid fixed-point decimal.
    #[error("Invalid amount: {value}")]
    InvalidAmount { value: String },

    /// Check-out is not after check-in.
    #[error("Invalid stay dates: check-out {check_out} must be after check-in {check_in}")]
    InvalidStayDates { check_in: String, check_out: String },

    /// Guest count must be at least one.
    #[error("Invalid guest count: {count} (must be greater than 0)")]
    InvalidGuestCount { count: u32 },
}
