//! Offer lifecycle state machine and the payment enums around it.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Booking lifecycle of an offer.
///
/// State transitions:
/// ```text
/// Draft ──┬──► PaymentPending ──► Paid ──► BookingStarted ──┬──► BookingConfirmed
///         │                        │                        └──► BookingFailed
///         │                        └──────────────────────────► BookingFailed
///         └──► InvoicePending ──┬──► Paid
///                               └──► BookingConfirmed (manual)
/// ```
/// `Draft` may also move straight to `Paid` when a completed checkout arrives
/// before the offer was marked pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    /// Created by the intake flow, not yet offered for payment.
    #[default]
    Draft,

    /// A checkout session is open with the payment provider.
    PaymentPending,

    /// Payment succeeded; waiting for the orchestrator.
    Paid,

    /// Awaiting a manually confirmed bank transfer.
    InvoicePending,

    /// The orchestrator owns the offer and is talking to the supplier.
    BookingStarted,

    /// The supplier confirmed the reservation (terminal state).
    BookingConfirmed,

    /// The booking could not be completed (terminal state).
    BookingFailed,
}

impl OfferStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [OfferStatus; 7] = [
        OfferStatus::Draft,
        OfferStatus::PaymentPending,
        OfferStatus::InvoicePending,
        OfferStatus::Paid,
        OfferStatus::BookingStarted,
        OfferStatus::BookingConfirmed,
        OfferStatus::BookingFailed,
    ];

    /// Returns true if the lifecycle graph has an edge from `self` to `next`.
    ///
    /// `BookingStarted → BookingStarted` is allowed so the orchestrator can
    /// record supplier data while it holds the offer.
    pub fn can_transition_to(&self, next: OfferStatus) -> bool {
        use OfferStatus::*;
        matches!(
            (self, next),
            (Draft, PaymentPending)
                | (Draft, InvoicePending)
                | (Draft, Paid)
                | (PaymentPending, PaymentPending)
                | (PaymentPending, InvoicePending)
                | (PaymentPending, Paid)
                | (InvoicePending, Paid)
                | (InvoicePending, BookingConfirmed)
                | (Paid, BookingStarted)
                | (Paid, BookingFailed)
                | (BookingStarted, BookingStarted)
                | (BookingStarted, BookingConfirmed)
                | (BookingStarted, BookingFailed)
        )
    }

    /// Returns true if no further automatic transition occurs.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OfferStatus::BookingConfirmed | OfferStatus::BookingFailed
        )
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Draft => "draft",
            OfferStatus::PaymentPending => "payment_pending",
            OfferStatus::Paid => "paid",
            OfferStatus::InvoicePending => "invoice_pending",
            OfferStatus::BookingStarted => "booking_started",
            OfferStatus::BookingConfirmed => "booking_confirmed",
            OfferStatus::BookingFailed => "booking_failed",
        }
    }
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OfferStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OfferStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("offer status", s))
    }
}

/// Payment state of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Pending,
    Paid,
}

impl PaymentStatus {
    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(UnknownVariant::new("payment status", other)),
        }
    }
}

/// How the client pays for the offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    /// Card checkout with the payment provider.
    #[default]
    Online,
    /// Bank transfer confirmed by an agent.
    Invoice,
}

impl PaymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Online => "online",
            PaymentMode::Invoice => "invoice",
        }
    }
}

impl FromStr for PaymentMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(PaymentMode::Online),
            "invoice" => Ok(PaymentMode::Invoice),
            other => Err(UnknownVariant::new("payment mode", other)),
        }
    }
}

/// Cancellation terms of the quoted rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TariffType {
    Refundable,
    NonRefundable,
}

impl TariffType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TariffType::Refundable => "refundable",
            TariffType::NonRefundable => "non_refundable",
        }
    }
}

impl FromStr for TariffType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "refundable" => Ok(TariffType::Refundable),
            "non_refundable" => Ok(TariffType::NonRefundable),
            other => Err(UnknownVariant::new("tariff type", other)),
        }
    }
}

/// Why a booking ended in `booking_failed`.
///
/// `ConfirmationTimeout` is kept apart from `SupplierRejected`: after a
/// timeout the supplier may still hold a live reservation, so operations
/// must check with the supplier before re-selling or refunding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Supplier credentials are missing.
    Configuration,
    /// The offer lacks data needed to book (e.g. no rate token).
    InvalidInput,
    /// The supplier reported an error for the booking.
    SupplierRejected,
    /// No terminal status was observed within the polling window.
    ConfirmationTimeout,
    /// Transport failure or malformed supplier response.
    Unexpected,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Configuration => "configuration",
            FailureKind::InvalidInput => "invalid_input",
            FailureKind::SupplierRejected => "supplier_rejected",
            FailureKind::ConfirmationTimeout => "confirmation_timeout",
            FailureKind::Unexpected => "unexpected",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FailureKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "configuration" => Ok(FailureKind::Configuration),
            "invalid_input" => Ok(FailureKind::InvalidInput),
            "supplier_rejected" => Ok(FailureKind::SupplierRejected),
            "confirmation_timeout" => Ok(FailureKind::ConfirmationTimeout),
            "unexpected" => Ok(FailureKind::Unexpected),
            other => Err(UnknownVariant::new("failure kind", other)),
        }
    }
}

/// A stored enum value that does not match any known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_draft() {
        assert_eq!(OfferStatus::default(), OfferStatus::Draft);
    }

    #[test]
    fn test_terminal_states() {
        for status in OfferStatus::ALL {
            let expected = matches!(
                status,
                OfferStatus::BookingConfirmed | OfferStatus::BookingFailed
            );
            assert_eq!(status.is_terminal(), expected, "{status}");
        }
    }

    #[test]
    fn test_terminal_states_have_no_outgoing_edges() {
        for from in [OfferStatus::BookingConfirmed, OfferStatus::BookingFailed] {
            for to in OfferStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_no_edge_leads_back_to_draft_or_paid_from_booking() {
        for from in [
            OfferStatus::BookingStarted,
            OfferStatus::BookingConfirmed,
            OfferStatus::BookingFailed,
        ] {
            assert!(!from.can_transition_to(OfferStatus::Draft));
            assert!(!from.can_transition_to(OfferStatus::Paid));
            assert!(!from.can_transition_to(OfferStatus::PaymentPending));
        }
        assert!(!OfferStatus::BookingConfirmed.can_transition_to(OfferStatus::BookingStarted));
    }

    #[test]
    fn test_orchestrator_edges() {
        assert!(OfferStatus::Paid.can_transition_to(OfferStatus::BookingStarted));
        assert!(OfferStatus::BookingStarted.can_transition_to(OfferStatus::BookingConfirmed));
        assert!(OfferStatus::BookingStarted.can_transition_to(OfferStatus::BookingFailed));
        assert!(!OfferStatus::Draft.can_transition_to(OfferStatus::BookingStarted));
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in OfferStatus::ALL {
            assert_eq!(status.as_str().parse::<OfferStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<OfferStatus>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&OfferStatus::BookingConfirmed).unwrap();
        assert_eq!(json, "\"booking_confirmed\"");
        let json = serde_json::to_string(&FailureKind::ConfirmationTimeout).unwrap();
        assert_eq!(json, "\"confirmation_timeout\"");
    }

    #[test]
    fn test_failure_kind_parse() {
        assert_eq!(
            "supplier_rejected".parse::<FailureKind>().unwrap(),
            FailureKind::SupplierRejected
        );
        assert!("boom".parse::<FailureKind>().is_err());
    }
}
