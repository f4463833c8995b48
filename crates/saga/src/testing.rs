use chrono::{NaiveDate, Utc};
use common::{CompanyId, PartyId};
use domain::{
    BookingOffer, ClientContact, CommercialTerms, CurrencyCode, Money, NewOffer, OfferTransition,
    PaymentMode, StayDetails, TariffType,
};
use store::{InMemoryStore, OfferStore};

pub fn draft_offer() -> BookingOffer {
    BookingOffer::draft(
        NewOffer {
            company_id: CompanyId::new(),
            client_party_id: Some(PartyId::new()),
            partner_order_id: Some("HO-1".to_string()),
            stay: StayDetails {
                hotel_ref: "test_hotel".to_string(),
                hotel_name: Some("Test Hotel".to_string()),
                hotel_address: Some("Lisbon, Portugal".to_string()),
                room_name: Some("Double Standard".to_string()),
                meal: None,
                check_in: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
                check_out: NaiveDate::from_ymd_opt(2026, 6, 4).unwrap(),
                guest_count: 2,
            },
            terms: CommercialTerms {
                currency: CurrencyCode::eur(),
                supplier_amount: Money::from_major(400),
                client_amount: Money::from_major(500),
                tariff_type: TariffType::Refundable,
                book_hash: Some("H1".to_string()),
            },
            client: ClientContact {
                name: Some("Silva".to_string()),
                email: Some("silva@example.com".to_string()),
                phone: None,
            },
            payment_mode: PaymentMode::Online,
        },
        Utc::now(),
    )
    .unwrap()
}

pub fn paid_offer() -> BookingOffer {
    let mut offer = draft_offer();
    OfferTransition::PaymentReceived {
        checkout_session_id: Some("cs_test_1".to_string()),
        payment_intent_id: Some("pi_test_1".to_string()),
    }
    .try_apply(&mut offer, Utc::now())
    .unwrap();
    offer
}

pub async fn stored_paid_offer(store: &InMemoryStore) -> BookingOffer {
    let offer = paid_offer();
    store.insert_offer(offer.clone()).await.unwrap();
    offer
}
