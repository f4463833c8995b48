use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{CompanyId, OfferId, OrderId, PartyId};
use domain::{
    BookingEventKind, BookingOffer, CommercialTerms, OfferStatus, OfferTransition, OrderLineItem,
    ServiceCategory, TravelOrder,
};
use futures_core::Stream;

use crate::{EventQuery, EventRecord, Result};

/// A stream of logged events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventRecord>> + Send>>;

/// Durable storage of booking offers.
///
/// Lifecycle columns change only through [`OfferStore::apply_transition`],
/// which every implementation performs as a single atomic conditional update.
#[async_trait]
pub trait OfferStore: Send + Sync {
    /// Inserts a new offer.
    async fn insert_offer(&self, offer: BookingOffer) -> Result<()>;

    /// Loads an offer by id.
    async fn get_offer(&self, id: OfferId) -> Result<Option<BookingOffer>>;

    /// Applies `transition` if, and only if, the stored offer admits it.
    ///
    /// Returns the updated offer, or `None` when the guard rejected the
    /// transition and nothing was written. Concurrent callers racing on the
    /// same offer are totally ordered: at most one of them sees `Some`.
    async fn apply_transition(
        &self,
        id: OfferId,
        transition: &OfferTransition,
        now: DateTime<Utc>,
    ) -> Result<Option<BookingOffer>>;

    /// Replaces the commercial terms of an unpaid offer.
    async fn update_terms(
        &self,
        id: OfferId,
        terms: CommercialTerms,
        now: DateTime<Utc>,
    ) -> Result<BookingOffer>;

    /// Lists offers in `status` whose last update is older than `updated_before`.
    async fn list_offers_by_status(
        &self,
        status: OfferStatus,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<BookingOffer>>;
}

/// Append-only log of booking events.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Appends an event and returns its sequence number.
    async fn append_event(&self, record: EventRecord) -> Result<i64>;

    /// Retrieves all events for an offer, oldest first.
    async fn events_for_offer(&self, offer_id: OfferId) -> Result<Vec<EventRecord>>;

    /// Retrieves events matching a query.
    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventRecord>>;

    /// Streams every event in log order.
    async fn stream_all_events(&self) -> Result<EventStream>;
}

/// Extension trait providing convenience methods for event logs.
#[async_trait]
pub trait EventLogExt: EventLog {
    /// Appends `kind` for `offer` as a system event.
    async fn record_event(&self, offer: &BookingOffer, kind: &BookingEventKind) -> Result<i64> {
        self.append_event(EventRecord::for_offer(offer, kind)?).await
    }

    /// Appends `kind` for `offer` on behalf of a human actor.
    async fn record_event_by(
        &self,
        offer: &BookingOffer,
        kind: &BookingEventKind,
        actor: &str,
    ) -> Result<i64> {
        self.append_event(EventRecord::for_offer(offer, kind)?.created_by(actor))
            .await
    }
}

// Blanket implementation for all EventLog implementations
impl<T: EventLog + ?Sized> EventLogExt for T {}

/// Customer-facing orders and their line items.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Finds an order of this client whose dates overlap `[from, to]`.
    async fn find_overlapping_order(
        &self,
        company_id: CompanyId,
        client_party_id: PartyId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Option<TravelOrder>>;

    /// Inserts a new order.
    async fn insert_order(&self, order: TravelOrder) -> Result<()>;

    /// Finds a line item of `order_id` with this category and reference.
    async fn find_line_item(
        &self,
        order_id: OrderId,
        category: ServiceCategory,
        ref_nr: &str,
    ) -> Result<Option<OrderLineItem>>;

    /// Inserts a new line item.
    async fn insert_line_item(&self, item: OrderLineItem) -> Result<()>;

    /// Lists every line item carrying this reference, across orders.
    async fn line_items_by_ref(&self, ref_nr: &str) -> Result<Vec<OrderLineItem>>;
}

/// Record of payment-provider deliveries already processed.
#[async_trait]
pub trait WebhookReceipts: Send + Sync {
    /// Returns true if this provider event id was already processed.
    async fn has_delivery(&self, provider_event_id: &str) -> Result<bool>;

    /// Records a processed delivery. Returns false if it was already recorded.
    async fn record_delivery(
        &self,
        provider_event_id: &str,
        offer_id: Option<OfferId>,
        received_at: DateTime<Utc>,
    ) -> Result<bool>;
}

/// Everything the finalization core needs from persistence.
pub trait BookingStore: OfferStore + EventLog + OrderLedger + WebhookReceipts {}

impl<T: OfferStore + EventLog + OrderLedger + WebhookReceipts + ?Sized> BookingStore for T {}
