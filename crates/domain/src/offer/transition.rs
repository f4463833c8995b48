//! Lifecycle transitions of a booking offer.
//!
//! Stores apply a transition as one conditional update: they check
//! [`OfferTransition::admits`] against the current row and write the result of
//! [`OfferTransition::apply`] atomically, or change nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{FailureKind, OfferStatus, PaymentMode, PaymentStatus};
use super::value_objects::SupplierPaymentTerms;
use super::BookingOffer;
use crate::error::OfferError;

/// A single change to an offer's lifecycle columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OfferTransition {
    /// A checkout session was opened with the payment provider.
    CheckoutStarted { checkout_session_id: String },

    /// The client chose to pay by bank transfer.
    InvoiceRequested,

    /// The payment provider reported a completed, paid checkout.
    PaymentReceived {
        checkout_session_id: Option<String>,
        payment_intent_id: Option<String>,
    },

    /// An agent confirmed the bank transfer arrived.
    InvoicePaid,

    /// Entry guard: the orchestrator takes ownership of a paid offer.
    BookingStarted { partner_order_id: String },

    /// The supplier opened a booking form and quoted its payment terms.
    SupplierFormRecorded {
        supplier_order_id: String,
        terms: SupplierPaymentTerms,
    },

    /// The supplier confirmed the reservation.
    BookingConfirmed {
        confirmation_number: Option<String>,
        supplier_order_id: Option<String>,
    },

    /// The booking ended without a reservation.
    BookingFailed { kind: FailureKind, message: String },
}

impl OfferTransition {
    /// Statuses this transition may start from.
    pub fn allowed_from(&self) -> &'static [OfferStatus] {
        use OfferStatus::*;
        match self {
            OfferTransition::CheckoutStarted { .. } => &[Draft, PaymentPending],
            OfferTransition::InvoiceRequested => &[Draft, PaymentPending],
            OfferTransition::PaymentReceived { .. } => &[Draft, PaymentPending, InvoicePending],
            OfferTransition::InvoicePaid => &[InvoicePending],
            OfferTransition::BookingStarted { .. } => &[Paid],
            OfferTransition::SupplierFormRecorded { .. } => &[BookingStarted],
            OfferTransition::BookingConfirmed { .. } => &[BookingStarted],
            OfferTransition::BookingFailed { .. } => &[Paid, BookingStarted],
        }
    }

    /// Status the offer has after the transition.
    pub fn target(&self) -> OfferStatus {
        match self {
            OfferTransition::CheckoutStarted { .. } => OfferStatus::PaymentPending,
            OfferTransition::InvoiceRequested => OfferStatus::InvoicePending,
            OfferTransition::PaymentReceived { .. } | OfferTransition::InvoicePaid => {
                OfferStatus::Paid
            }
            OfferTransition::BookingStarted { .. }
            | OfferTransition::SupplierFormRecorded { .. } => OfferStatus::BookingStarted,
            OfferTransition::BookingConfirmed { .. } => OfferStatus::BookingConfirmed,
            OfferTransition::BookingFailed { .. } => OfferStatus::BookingFailed,
        }
    }

    /// Returns true if the transition may be applied to `offer` as it is now.
    pub fn admits(&self, offer: &BookingOffer) -> bool {
        if !self.allowed_from().contains(&offer.status)
            || !offer.status.can_transition_to(self.target())
        {
            return false;
        }
        match self {
            OfferTransition::PaymentReceived { .. } => !offer.is_paid(),
            OfferTransition::BookingStarted { .. } => offer.is_paid(),
            _ => true,
        }
    }

    /// Writes the transition's effects onto `offer` without checking the guard.
    pub fn apply(&self, offer: &mut BookingOffer, now: DateTime<Utc>) {
        match self {
            OfferTransition::CheckoutStarted {
                checkout_session_id,
            } => {
                offer.payment_mode = PaymentMode::Online;
                offer.payment_status = PaymentStatus::Pending;
                offer.checkout_session_id = Some(checkout_session_id.clone());
            }
            OfferTransition::InvoiceRequested => {
                offer.payment_mode = PaymentMode::Invoice;
                offer.payment_status = PaymentStatus::Pending;
            }
            OfferTransition::PaymentReceived {
                checkout_session_id,
                payment_intent_id,
            } => {
                offer.payment_status = PaymentStatus::Paid;
                offer.paid_at = Some(now);
                if checkout_session_id.is_some() {
                    offer.checkout_session_id = checkout_session_id.clone();
                }
                if payment_intent_id.is_some() {
                    offer.payment_intent_id = payment_intent_id.clone();
                }
            }
            OfferTransition::InvoicePaid => {
                offer.payment_status = PaymentStatus::Paid;
                offer.paid_at = Some(now);
            }
            OfferTransition::BookingStarted { partner_order_id } => {
                if offer.partner_order_id.is_none() {
                    offer.partner_order_id = Some(partner_order_id.clone());
                }
            }
            OfferTransition::SupplierFormRecorded {
                supplier_order_id,
                terms,
            } => {
                offer.supplier_order_id = Some(supplier_order_id.clone());
                offer.supplier_terms = Some(terms.clone());
            }
            OfferTransition::BookingConfirmed {
                confirmation_number,
                supplier_order_id,
            } => {
                offer.booked_at = Some(now);
                offer.confirmation_number = confirmation_number.clone();
                if supplier_order_id.is_some() {
                    offer.supplier_order_id = supplier_order_id.clone();
                }
                offer.error_message = None;
                offer.failure_kind = None;
            }
            OfferTransition::BookingFailed { kind, message } => {
                offer.error_message = Some(message.clone());
                offer.failure_kind = Some(*kind);
            }
        }
        offer.status = self.target();
        offer.updated_at = now;
    }

    /// Checks the guard and applies the transition.
    pub fn try_apply(&self, offer: &mut BookingOffer, now: DateTime<Utc>) -> Result<(), OfferError> {
        if !self.admits(offer) {
            return Err(OfferError::InvalidTransition {
                from: offer.status,
                to: self.target(),
            });
        }
        self.apply(offer, now);
        Ok(())
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            OfferTransition::CheckoutStarted { .. } => "checkout_started",
            OfferTransition::InvoiceRequested => "invoice_requested",
            OfferTransition::PaymentReceived { .. } => "payment_received",
            OfferTransition::InvoicePaid => "invoice_paid",
            OfferTransition::BookingStarted { .. } => "booking_started",
            OfferTransition::SupplierFormRecorded { .. } => "supplier_form_recorded",
            OfferTransition::BookingConfirmed { .. } => "booking_confirmed",
            OfferTransition::BookingFailed { .. } => "booking_failed",
        }
    }
}
