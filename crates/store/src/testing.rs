use chrono::{NaiveDate, Utc};
use common::{CompanyId, PartyId};
use domain::{
    BookingOffer, ClientContact, CommercialTerms, CurrencyCode, Money, NewOffer, PaymentMode,
    StayDetails, TariffType,
};

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
                hotel_address: Some("Lisbon, Portugal".to_string()),
                room_name: Some("Double Standard".to_string()),
                meal: Some("breakfast".to_string()),
                check_in: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
                check_out: NaiveDate::from_ymd_opt(2026, 6, 4).unwrap(),
                guest_count: 2,
            },
            terms: CommercialTerms {
                currency: CurrencyCode::new("EUR").unwrap(),
                supplier_amount: Money::from_major(400),
                client_amount: Money::from_major(500),
                tariff_type: TariffType::NonRefundable,
                book_hash: Some("H1".to_string()),
            },
            client: ClientContact {
                name: Some("Silva".to_string()),
                email: None,
                phone: None,
            },
            payment_mode: PaymentMode::Online,
        },
        Utc::now(),
    )
    .unwrap()
}
