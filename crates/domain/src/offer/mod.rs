//! Booking offer entity.
//!
//! A [`BookingOffer`] is a priced hotel stay moving from draft through payment
//! to a supplier-confirmed (or failed) reservation. Lifecycle columns only
//! change through an [`OfferTransition`]; commercial terms only change through
//! [`BookingOffer::update_terms`] and freeze once payment succeeds.

mod events;
mod state;
mod transition;
mod value_objects;

pub use events::BookingEventKind;
pub use state::{FailureKind, OfferStatus, PaymentMode, PaymentStatus, TariffType, UnknownVariant};
pub use transition::OfferTransition;
pub use value_objects::{
    ClientContact, CommercialTerms, CurrencyCode, Money, StayDetails, SupplierPaymentTerms,
};

use chrono::{DateTime, Utc};
use common::{CompanyId, OfferId, PartyId};
use serde::{Deserialize, Serialize};

use crate::error::OfferError;

/// Input for creating an offer in `draft`.
#[derive(Debug, Clone)]
pub struct NewOffer {
    pub company_id: CompanyId,
    pub client_party_id: Option<PartyId>,
    pub partner_order_id: Option<String>,
    pub stay: StayDetails,
    pub terms: CommercialTerms,
    pub client: ClientContact,
    pub payment_mode: PaymentMode,
}

/// A priced hotel stay pending or completed booking with a supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingOffer {
    pub id: OfferId,
    pub company_id: CompanyId,
    pub client_party_id: Option<PartyId>,

    /// Correlation id shared with the supplier. Assigned once, never replaced.
    pub partner_order_id: Option<String>,

    pub stay: StayDetails,
    pub terms: CommercialTerms,
    pub client: ClientContact,

    pub payment_mode: PaymentMode,
    pub payment_status: PaymentStatus,
    pub checkout_session_id: Option<String>,
    pub payment_intent_id: Option<String>,

    pub status: OfferStatus,
    pub supplier_order_id: Option<String>,
    pub supplier_terms: Option<SupplierPaymentTerms>,
    pub confirmation_number: Option<String>,
    pub error_message: Option<String>,
    pub failure_kind: Option<FailureKind>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub booked_at: Option<DateTime<Utc>>,
}

impl BookingOffer {
    /// Creates a validated offer in `draft`.
    pub fn draft(input: NewOffer, now: DateTime<Utc>) -> Result<Self, OfferError> {
        validate_stay(&input.stay)?;
        validate_terms(&input.terms)?;

        Ok(Self {
            id: OfferId::new(),
            company_id: input.company_id,
            client_party_id: input.client_party_id,
            partner_order_id: input.partner_order_id,
            stay: input.stay,
            terms: input.terms,
            client: input.client,
            payment_mode: input.payment_mode,
            payment_status: PaymentStatus::Unpaid,
            checkout_session_id: None,
            payment_intent_id: None,
            status: OfferStatus::Draft,
            supplier_order_id: None,
            supplier_terms: None,
            confirmation_number: None,
            error_message: None,
            failure_kind: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
            booked_at: None,
        })
    }

    /// Returns true once the client's money has been received.
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    /// Replaces the commercial terms (re-pricing before payment).
    ///
    /// Rejected with [`OfferError::TermsLocked`] once the offer is paid.
    pub fn update_terms(
        &mut self,
        terms: CommercialTerms,
        now: DateTime<Utc>,
    ) -> Result<(), OfferError> {
        if self.is_paid() || self.status.is_terminal() {
            return Err(OfferError::TermsLocked {
                offer_id: self.id.to_string(),
            });
        }
        validate_terms(&terms)?;
        self.terms = terms;
        self.updated_at = now;
        Ok(())
    }

    /// Returns the partner order id to use for the supplier, generating one
    /// from the offer id and `now` when none was assigned at creation.
    pub fn partner_order_id_or_generate(&self, now: DateTime<Utc>) -> String {
        match &self.partner_order_id {
            Some(existing) => existing.clone(),
            None => generate_partner_order_id(self.id, now),
        }
    }
}

/// Builds a partner order id of the form `HO-<unix millis>-<first 8 chars of id>`.
pub fn generate_partner_order_id(offer_id: OfferId, now: DateTime<Utc>) -> String {
    let id = offer_id.to_string();
    let prefix: String = id.chars().take(8).collect();
    format!("HO-{}-{}", now.timestamp_millis(), prefix)
}

fn validate_stay(stay: &StayDetails) -> Result<(), OfferError> {
    if stay.check_out <= stay.check_in {
        return Err(OfferError::InvalidStayDates {
            check_in: stay.check_in.to_string(),
            check_out: stay.check_out.to_string(),
        });
    }
    if stay.guest_count == 0 {
        return Err(OfferError::InvalidGuestCount { count: 0 });
    }
    Ok(())
}

fn validate_terms(terms: &CommercialTerms) -> Result<(), OfferError> {
    for amount in [terms.supplier_amount, terms.client_amount] {
        if amount.minor_units() < 0 {
            return Err(OfferError::InvalidAmount {
                value: amount.to_string(),
            });
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_draft_starts_unpaid() {
        let offer = draft_offer();
        assert_eq!(offer.status, OfferStatus::Draft);
        assert_eq!(offer.payment_status, PaymentStatus::Unpaid);
        assert!(offer.confirmation_number.is_none());
        assert!(!offer.is_paid());
    }

    #[test]
    fn test_draft_rejects_inverted_dates() {
        let mut input = new_offer();
        input.stay.check_out = input.stay.check_in;
        assert!(matches!(
            BookingOffer::draft(input, Utc::now()),
            Err(OfferError::InvalidStayDates { .. })
        ));
    }

    #[test]
    fn test_draft_rejects_zero_guests() {
        let mut input = new_offer();
        input.stay.guest_count = 0;
        assert!(matches!(
            BookingOffer::draft(input, Utc::now()),
            Err(OfferError::InvalidGuestCount { .. })
        ));
    }

    #[test]
    fn test_terms_can_change_before_payment() {
        let mut offer = draft_offer();
        let mut terms = offer.terms.clone();
        terms.client_amount = Money::from_major(550);
        offer.update_terms(terms, Utc::now()).unwrap();
        assert_eq!(offer.terms.client_amount, Money::from_major(550));
    }

    #[test]
    fn test_terms_locked_after_payment() {
        let mut offer = draft_offer();
        OfferTransition::PaymentReceived {
            checkout_session_id: Some("cs_1".into()),
            payment_intent_id: Some("pi_1".into()),
        }
        .try_apply(&mut offer, Utc::now())
        .unwrap();

        let mut terms = offer.terms.clone();
        terms.client_amount = Money::from_major(1);
        terms.currency = CurrencyCode::new("USD").unwrap();

        let result = offer.update_terms(terms, Utc::now());
        assert!(matches!(result, Err(OfferError::TermsLocked { .. })));
        assert_eq!(offer.terms.client_amount, Money::from_major(500));
        assert_eq!(offer.terms.currency.as_str(), "EUR");
    }

    #[test]
    fn test_generated_partner_order_id_format() {
        let offer = draft_offer();
        let now = Utc::now();
        let generated = generate_partner_order_id(offer.id, now);
        let expected_prefix = format!("HO-{}-", now.timestamp_millis());
        assert!(generated.starts_with(&expected_prefix));
        assert_eq!(generated.len(), expected_prefix.len() + 8);
        assert!(offer.id.to_string().starts_with(&generated[expected_prefix.len()..]));
    }

    #[test]
    fn test_existing_partner_order_id_is_reused() {
        let offer = draft_offer();
        assert_eq!(offer.partner_order_id_or_generate(Utc::now()), "HO-1");
    }

    #[test]
    fn test_offer_serialization() {
        let offer = draft_offer();
        let json = serde_json::to_value(&offer).unwrap();
        assert_eq!(json["status"], "draft");
        assert_eq!(json["terms"]["currency"], "EUR");
        assert_eq!(json["terms"]["client_amount"], 50000);
        let back: BookingOffer = serde_json::from_value(json).unwrap();
        assert_eq!(back, offer);
    }
}
