//! Customer-facing order records derived from confirmed bookings.

use chrono::{DateTime, NaiveDate, Utc};
use common::{CompanyId, LineItemId, OrderId, PartyId};
use serde::{Deserialize, Serialize};

use crate::offer::{BookingOffer, CurrencyCode, Money};

/// Supplier name recorded on hotel line items.
pub const HOTEL_SUPPLIER_NAME: &str = "RateHawk";

/// A travel order grouping the services sold to one client for one trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelOrder {
    pub id: OrderId,
    pub company_id: CompanyId,
    pub client_party_id: PartyId,
    pub client_display_name: String,
    /// Order status; projected orders start as "Active".
    pub status: String,
    /// Order type; "TO" for tour orders.
    pub order_type: String,
    pub destination: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl TravelOrder {
    /// Builds a new order covering the offer's stay.
    ///
    /// Returns `None` when the offer has no client party to attach it to.
    pub fn for_offer(offer: &BookingOffer, now: DateTime<Utc>) -> Option<Self> {
        let client_party_id = offer.client_party_id?;
        Some(Self {
            id: OrderId::new(),
            company_id: offer.company_id,
            client_party_id,
            client_display_name: offer.client.name.clone().unwrap_or_default(),
            status: "Active".to_string(),
            order_type: "TO".to_string(),
            destination: offer
                .stay
                .hotel_address
                .clone()
                .unwrap_or_else(|| "Hotel booking".to_string()),
            date_from: offer.stay.check_in,
            date_to: offer.stay.check_out,
            created_at: now,
        })
    }

    /// Returns true if the order's dates overlap `[from, to]`.
    pub fn overlaps(&self, from: NaiveDate, to: NaiveDate) -> bool {
        self.date_from <= to && self.date_to >= from
    }
}

/// Category of a service line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    Accommodation,
}

impl ServiceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceCategory::Accommodation => "accommodation",
        }
    }
}

/// One purchased service inside a travel order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub id: LineItemId,
    pub order_id: OrderId,
    pub company_id: CompanyId,
    pub category: ServiceCategory,
    /// Reference shared with the supplier; the partner order id for hotels.
    pub ref_nr: String,
    pub service_name: String,
    pub room: Option<String>,
    pub board: Option<String>,
    pub supplier_name: String,
    pub currency: CurrencyCode,
    pub client_price: Money,
    pub service_price: Money,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub reservation_status: String,
    pub created_at: DateTime<Utc>,
}

impl OrderLineItem {
    /// Builds the accommodation line for a confirmed offer.
    pub fn accommodation(
        order_id: OrderId,
        offer: &BookingOffer,
        ref_nr: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LineItemId::new(),
            order_id,
            company_id: offer.company_id,
            category: ServiceCategory::Accommodation,
            ref_nr: ref_nr.into(),
            service_name: offer
                .stay
                .hotel_name
                .clone()
                .unwrap_or_else(|| "Hotel".to_string()),
            room: offer.stay.room_name.clone(),
            board: offer.stay.meal.clone(),
            supplier_name: HOTEL_SUPPLIER_NAME.to_string(),
            currency: offer.terms.currency.clone(),
            client_price: offer.terms.client_amount,
            service_price: offer.terms.supplier_amount,
            date_from: offer.stay.check_in,
            date_to: offer.stay.check_out,
            reservation_status: "confirmed".to_string(),
            created_at: now,
        }
    }
}
