//! Payloads appended to the booking event log.

use common::{LineItemId, OrderId};
use serde::{Deserialize, Serialize};

use super::state::FailureKind;
use super::value_objects::{CurrencyCode, Money};

/// Events recorded for an offer, one per transition or side effect.
///
/// Stored as `event_type` plus the JSON `data` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BookingEventKind {
    /// A checkout session was opened.
    CheckoutStarted { checkout_session_id: String },

    /// The client chose to pay by invoice.
    InvoiceRequested,

    /// The payment provider reported a paid checkout.
    PaymentSucceeded {
        provider_event_id: Option<String>,
        checkout_session_id: Option<String>,
        payment_intent_id: Option<String>,
    },

    /// An agent confirmed the bank transfer.
    InvoicePaid,

    /// The orchestrator passed the entry guard.
    BookingStarted { partner_order_id: String },

    /// The supplier opened a booking form.
    BookingFormCreated {
        supplier_order_id: String,
        payment_type: String,
        amount: Money,
        currency: CurrencyCode,
        price_mismatch: bool,
    },

    /// The booking request was submitted to the supplier.
    BookingSubmitted { partner_order_id: String },

    /// The supplier confirmed the reservation.
    BookingConfirmed {
        supplier_order_id: Option<String>,
        confirmation_number: Option<String>,
        poll_attempts: u32,
    },

    /// The booking ended without a reservation.
    BookingFailed { kind: FailureKind, reason: String },

    /// The confirmed booking was recorded as an order line item.
    OrderProjected {
        order_id: OrderId,
        line_item_id: LineItemId,
        order_created: bool,
    },
}

impl BookingEventKind {
    /// Returns the event type as stored in the log.
    pub fn event_type(&self) -> &'static str {
        match self {
            BookingEventKind::CheckoutStarted { .. } => "checkout_started",
            BookingEventKind::InvoiceRequested => "invoice_requested",
            BookingEventKind::PaymentSucceeded { .. } => "payment_succeeded",
            BookingEventKind::InvoicePaid => "invoice_paid",
            BookingEventKind::BookingStarted { .. } => "booking_started",
            BookingEventKind::BookingFormCreated { .. } => "booking_form_created",
            BookingEventKind::BookingSubmitted { .. } => "booking_submitted",
            BookingEventKind::BookingConfirmed { .. } => "booking_confirmed",
            BookingEventKind::BookingFailed { .. } => "booking_failed",
            BookingEventKind::OrderProjected { .. } => "order_projected",
        }
    }

    /// Returns the transition-specific payload (`null` for payload-less events).
    pub fn payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        Ok(value
            .get_mut("data")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null))
    }

    /// Rebuilds an event from its stored type and payload.
    pub fn from_parts(
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        let mut envelope = serde_json::Map::new();
        envelope.insert("type".to_string(), serde_json::Value::from(event_type));
        if !payload.is_null() {
            envelope.insert("data".to_string(), payload.clone());
        }
        serde_json::from_value(serde_json::Value::Object(envelope))
    }
}
