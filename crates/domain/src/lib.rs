//! Domain layer for hotel booking finalization.
//!
//! This crate provides:
//! - the `BookingOffer` entity and its lifecycle state machine
//! - `OfferTransition`, the only way lifecycle columns change
//! - `BookingEventKind`, the payloads written to the event log
//! - downstream `TravelOrder` / `OrderLineItem` records

pub mod error;
pub mod ledger;
pub mod offer;

pub use error::OfferError;
pub use ledger::{HOTEL_SUPPLIER_NAME, OrderLineItem, ServiceCategory, TravelOrder};
pub use offer::{
    BookingEventKind, BookingOffer, ClientContact, CommercialTerms, CurrencyCode, FailureKind,
    Money, NewOffer, OfferStatus, OfferTransition, PaymentMode, PaymentStatus, StayDetails,
    SupplierPaymentTerms, TariffType, UnknownVariant, generate_partner_order_id,
};
