use chrono::{NaiveDate, Utc};
use common::{CompanyId, OfferId, PartyId};
use domain::{
    BookingOffer, ClientContact, CommercialTerms, CurrencyCode, Money, NewOffer, OfferTransition,
    PaymentMode, StayDetails, TariffType,
};
use store::{InMemoryStore, OfferStore};

pub fn sample_offer() -> BookingOffer {
    sample_offer_with_ref("HO-1")
}

pub fn sample_offer_with_ref(partner_order_id: &str) -> BookingOffer {
    BookingOffer::draft(
        NewOffer {
            company_id: CompanyId::new(),
            client_party_id: Some(PartyId::new()),
            partner_order_id: Some(partner_order_id.to_string()),
            stay: StayDetails {
                hotel_ref: "test_hotel".to_string(),
                hotel_name: Some("Test Hotel".to_string()),
                hotel_address: Some("Porto, Portugal".to_string()),
                room_name: Some("Twin".to_string()),
                meal: Some("nomeal".to_string()),
                check_in: NaiveDate::from_ymd_opt(2026, 9, 10).unwrap(),
                check_out: NaiveDate::from_ymd_opt(2026, 9, 12).unwrap(),
                guest_count: 1,
            },
            terms: CommercialTerms {
                currency: CurrencyCode::new("EUR").unwrap(),
                supplier_amount: Money::from_major(400),
                client_amount: Money::from_major(500),
                tariff_type: TariffType::Refundable,
                book_hash: Some("H1".to_string()),
            },
            client: ClientContact {
                name: Some("Costa".to_string()),
                email: None,
                phone: None,
            },
            payment_mode: PaymentMode::Online,
        },
        Utc::now(),
    )
    .unwrap()
}

/// Drives a stored offer through payment to `booking_confirmed`.
pub async fn confirm(store: &InMemoryStore, id: OfferId) -> BookingOffer {
    let steps = [
        OfferTransition::PaymentReceived {
            checkout_session_id: None,
            payment_intent_id: Some("pi_1".to_string()),
        },
        OfferTransition::BookingStarted {
            partner_order_id: "unused".to_string(),
        },
        OfferTransition::BookingConfirmed {
            confirmation_number: Some("CONF123".to_string()),
            supplier_order_id: None,
        },
    ];
    let mut offer = None;
    for step in &steps {
        offer = store.apply_transition(id, step, Utc::now()).await.unwrap();
    }
    offer.unwrap()
}
