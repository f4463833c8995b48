use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{CompanyId, OfferId, OrderId, PartyId};
use domain::{
    BookingOffer, CommercialTerms, OfferStatus, OfferTransition, OrderLineItem, ServiceCategory,
    TravelOrder,
};
use tokio::sync::RwLock;

use crate::{
    EventQuery, EventRecord, Result, StoreError,
    store::{EventLog, EventStream, OfferStore, OrderLedger, WebhookReceipts},
};

/// In-memory booking store for tests and local runs.
///
/// Provides the same interface and the same conditional-update semantics as
/// the PostgreSQL implementation: each transition is checked and written
/// under one write lock.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    offers: Arc<RwLock<HashMap<OfferId, BookingOffer>>>,
    events: Arc<RwLock<Vec<EventRecord>>>,
    orders: Arc<RwLock<Vec<TravelOrder>>>,
    line_items: Arc<RwLock<Vec<OrderLineItem>>>,
    receipts: Arc<RwLock<HashMap<String, (Option<OfferId>, DateTime<Utc>)>>>,
    fail_ledger_writes: Arc<AtomicBool>,
    failing_event_types: Arc<RwLock<HashSet<String>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes order and line-item inserts fail, to simulate a ledger outage.
    pub fn set_fail_ledger_writes(&self, fail: bool) {
        self.fail_ledger_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes appends of `event_type` fail, to simulate an event log outage.
    pub async fn fail_event_appends(&self, event_type: &str) {
        self.failing_event_types
            .write()
            .await
            .insert(event_type.to_string());
    }

    /// Returns the total number of events logged.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Returns the number of orders in the ledger.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Returns the number of line items in the ledger.
    pub async fn line_item_count(&self) -> usize {
        self.line_items.read().await.len()
    }

    fn check_ledger_writable(&self) -> Result<()> {
        if self.fail_ledger_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "order ledger writes disabled".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl OfferStore for InMemoryStore {
    async fn insert_offer(&self, offer: BookingOffer) -> Result<()> {
        let mut offers = self.offers.write().await;
        let duplicate_partner_id = offer.partner_order_id.is_some()
            && offers
                .values()
                .any(|existing| existing.partner_order_id == offer.partner_order_id);
        if offers.contains_key(&offer.id) || duplicate_partner_id {
            return Err(StoreError::DuplicateOffer(offer.id));
        }
        offers.insert(offer.id, offer);
        Ok(())
    }

    async fn get_offer(&self, id: OfferId) -> Result<Option<BookingOffer>> {
        Ok(self.offers.read().await.get(&id).cloned())
    }

    async fn apply_transition(
        &self,
        id: OfferId,
        transition: &OfferTransition,
        now: DateTime<Utc>,
    ) -> Result<Option<BookingOffer>> {
        let mut offers = self.offers.write().await;
        let offer = offers.get_mut(&id).ok_or(StoreError::OfferNotFound(id))?;

        if !transition.admits(offer) {
            return Ok(None);
        }
        transition.apply(offer, now);
        Ok(Some(offer.clone()))
    }

    async fn update_terms(
        &self,
        id: OfferId,
        terms: CommercialTerms,
        now: DateTime<Utc>,
    ) -> Result<BookingOffer> {
        let mut offers = self.offers.write().await;
        let offer = offers.get_mut(&id).ok_or(StoreError::OfferNotFound(id))?;
        offer.update_terms(terms, now)?;
        Ok(offer.clone())
    }

    async fn list_offers_by_status(
        &self,
        status: OfferStatus,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<BookingOffer>> {
        let offers = self.offers.read().await;
        let mut matching: Vec<_> = offers
            .values()
            .filter(|o| o.status == status && o.updated_at < updated_before)
            .cloned()
            .collect();
        matching.sort_by_key(|o| o.updated_at);
        Ok(matching)
    }
}

#[async_trait]
impl EventLog for InMemoryStore {
    async fn append_event(&self, mut record: EventRecord) -> Result<i64> {
        if self
            .failing_event_types
            .read()
            .await
            .contains(&record.event_type)
        {
            return Err(StoreError::Unavailable("event log down".to_string()));
        }
        let mut events = self.events.write().await;
        let sequence = events.len() as i64 + 1;
        record.sequence = sequence;
        events.push(record);
        Ok(sequence)
    }

    async fn events_for_offer(&self, offer_id: OfferId) -> Result<Vec<EventRecord>> {
        self.query_events(EventQuery::for_offer(offer_id)).await
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventRecord>> {
        let events = self.events.read().await;
        let mut matching: Vec<_> = events
            .iter()
            .filter(|e| {
                if let Some(id) = query.offer_id
                    && e.offer_id != id
                {
                    return false;
                }
                if let Some(id) = query.company_id
                    && e.company_id != id
                {
                    return false;
                }
                if let Some(ref types) = query.event_types
                    && !types.contains(&e.event_type)
                {
                    return false;
                }
                if let Some(from) = query.from_timestamp
                    && e.created_at < from
                {
                    return false;
                }
                if let Some(to) = query.to_timestamp
                    && e.created_at > to
                {
                    return false;
                }
                true
            })
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.sequence.cmp(&b.sequence))
        });
        if query.newest_first {
            matching.reverse();
        }

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        let events = self.events.read().await.clone();
        let stream = stream::iter(events.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl OrderLedger for InMemoryStore {
    async fn find_overlapping_order(
        &self,
        company_id: CompanyId,
        client_party_id: PartyId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Option<TravelOrder>> {
        let orders = self.orders.read().await;
        Ok(orders
            .iter()
            .filter(|o| o.company_id == company_id && o.client_party_id == client_party_id)
            .filter(|o| o.overlaps(from, to))
            .min_by_key(|o| o.created_at)
            .cloned())
    }

    async fn insert_order(&self, order: TravelOrder) -> Result<()> {
        self.check_ledger_writable()?;
        self.orders.write().await.push(order);
        Ok(())
    }

    async fn find_line_item(
        &self,
        order_id: OrderId,
        category: ServiceCategory,
        ref_nr: &str,
    ) -> Result<Option<OrderLineItem>> {
        let items = self.line_items.read().await;
        Ok(items
            .iter()
            .find(|i| i.order_id == order_id && i.category == category && i.ref_nr == ref_nr)
            .cloned())
    }

    async fn insert_line_item(&self, item: OrderLineItem) -> Result<()> {
        self.check_ledger_writable()?;
        self.line_items.write().await.push(item);
        Ok(())
    }

    async fn line_items_by_ref(&self, ref_nr: &str) -> Result<Vec<OrderLineItem>> {
        let items = self.line_items.read().await;
        Ok(items.iter().filter(|i| i.ref_nr == ref_nr).cloned().collect())
    }
}

#[async_trait]
impl WebhookReceipts for InMemoryStore {
    async fn has_delivery(&self, provider_event_id: &str) -> Result<bool> {
        Ok(self.receipts.read().await.contains_key(provider_event_id))
    }

    async fn record_delivery(
        &self,
        provider_event_id: &str,
        offer_id: Option<OfferId>,
        received_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut receipts = self.receipts.write().await;
        if receipts.contains_key(provider_event_id) {
            return Ok(false);
        }
        receipts.insert(provider_event_id.to_string(), (offer_id, received_at));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventLogExt;
    use crate::testing::sample_offer;
    use domain::{BookingEventKind, FailureKind, Money, PaymentStatus};
    use futures_util::StreamExt;

    fn paid() -> OfferTransition {
        OfferTransition::PaymentReceived {
            checkout_session_id: Some("cs_1".to_string()),
            payment_intent_id: Some("pi_1".to_string()),
        }
    }

    fn started() -> OfferTransition {
        OfferTransition::BookingStarted {
            partner_order_id: "HO-1".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_and_get_offer() {
        let store = InMemoryStore::new();
        let offer = sample_offer();
        store.insert_offer(offer.clone()).await.unwrap();

        assert_eq!(store.get_offer(offer.id).await.unwrap(), Some(offer));
        assert!(store.get_offer(OfferId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_partner_order_id() {
        let store = InMemoryStore::new();
        store.insert_offer(sample_offer()).await.unwrap();

        let result = store.insert_offer(sample_offer()).await;
        assert!(matches!(result, Err(StoreError::DuplicateOffer(_))));
    }

    #[tokio::test]
    async fn transition_applies_when_admitted() {
        let store = InMemoryStore::new();
        let offer = sample_offer();
        store.insert_offer(offer.clone()).await.unwrap();

        let updated = store
            .apply_transition(offer.id, &paid(), Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, OfferStatus::Paid);
        assert_eq!(updated.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn transition_rejected_leaves_row_untouched() {
        let store = InMemoryStore::new();
        let offer = sample_offer();
        store.insert_offer(offer.clone()).await.unwrap();

        let result = store
            .apply_transition(offer.id, &started(), Utc::now())
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(store.get_offer(offer.id).await.unwrap(), Some(offer));
    }

    #[tokio::test]
    async fn transition_on_missing_offer_is_not_found() {
        let store = InMemoryStore::new();
        let result = store
            .apply_transition(OfferId::new(), &paid(), Utc::now())
            .await;
        assert!(matches!(result, Err(StoreError::OfferNotFound(_))));
    }

    #[tokio::test]
    async fn concurrent_entry_guard_admits_exactly_one() {
        let store = InMemoryStore::new();
        let offer = sample_offer();
        store.insert_offer(offer.clone()).await.unwrap();
        store
            .apply_transition(offer.id, &paid(), Utc::now())
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .apply_transition(offer.id, &started(), Utc::now())
                    .await
                    .unwrap()
                    .is_some()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn update_terms_locked_after_payment() {
        let store = InMemoryStore::new();
        let offer = sample_offer();
        store.insert_offer(offer.clone()).await.unwrap();

        let mut terms = offer.terms.clone();
        terms.client_amount = Money::from_major(600);
        let repriced = store
            .update_terms(offer.id, terms.clone(), Utc::now())
            .await
            .unwrap();
        assert_eq!(repriced.terms.client_amount, Money::from_major(600));

        store
            .apply_transition(offer.id, &paid(), Utc::now())
            .await
            .unwrap();

        terms.client_amount = Money::from_major(1);
        let result = store.update_terms(offer.id, terms, Utc::now()).await;
        assert!(matches!(
            result,
            Err(StoreError::Domain(domain::OfferError::TermsLocked { .. }))
        ));
        let stored = store.get_offer(offer.id).await.unwrap().unwrap();
        assert_eq!(stored.terms.client_amount, Money::from_major(600));
    }

    #[tokio::test]
    async fn list_by_status_respects_cutoff() {
        let store = InMemoryStore::new();
        let offer = sample_offer();
        store.insert_offer(offer.clone()).await.unwrap();
        let paid_at = Utc::now();
        store
            .apply_transition(offer.id, &paid(), paid_at)
            .await
            .unwrap();

        let before = store
            .list_offers_by_status(OfferStatus::Paid, paid_at)
            .await
            .unwrap();
        assert!(before.is_empty());

        let after = store
            .list_offers_by_status(OfferStatus::Paid, paid_at + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(after.len(), 1);
    }

    #[tokio::test]
    async fn events_are_ordered_and_queryable() {
        let store = InMemoryStore::new();
        let offer = sample_offer();
        let other = crate::testing::sample_offer_with_ref("HO-2");

        store
            .record_event(
                &offer,
                &BookingEventKind::BookingStarted {
                    partner_order_id: "HO-1".to_string(),
                },
            )
            .await
            .unwrap();
        store
            .record_event(
                &other,
                &BookingEventKind::BookingStarted {
                    partner_order_id: "HO-2".to_string(),
                },
            )
            .await
            .unwrap();
        store
            .record_event(
                &offer,
                &BookingEventKind::BookingFailed {
                    kind: FailureKind::ConfirmationTimeout,
                    reason: "Booking confirmation timed out".to_string(),
                },
            )
            .await
            .unwrap();

        let events = store.events_for_offer(offer.id).await.unwrap();
        let types: Vec<_> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["booking_started", "booking_failed"]);

        let newest = store
            .query_events(EventQuery::for_offer(offer.id).newest_first().limit(1))
            .await
            .unwrap();
        assert_eq!(newest[0].event_type, "booking_failed");

        let started = store
            .query_events(EventQuery::for_event_type("booking_started"))
            .await
            .unwrap();
        assert_eq!(started.len(), 2);

        let all: Vec<_> = store.stream_all_events().await.unwrap().collect().await;
        assert_eq!(all.len(), 3);
        assert_eq!(store.event_count().await, 3);
    }

    #[tokio::test]
    async fn receipts_record_once() {
        let store = InMemoryStore::new();
        assert!(!store.has_delivery("evt_1").await.unwrap());
        assert!(store.record_delivery("evt_1", None, Utc::now()).await.unwrap());
        assert!(!store.record_delivery("evt_1", None, Utc::now()).await.unwrap());
        assert!(store.has_delivery("evt_1").await.unwrap());
    }

    #[tokio::test]
    async fn ledger_write_failure_is_reported() {
        let store = InMemoryStore::new();
        let offer = sample_offer();
        let order = TravelOrder::for_offer(&offer, Utc::now()).unwrap();

        store.set_fail_ledger_writes(true);
        assert!(matches!(
            store.insert_order(order.clone()).await,
            Err(StoreError::Unavailable(_))
        ));

        store.set_fail_ledger_writes(false);
        store.insert_order(order.clone()).await.unwrap();
        let found = store
            .find_overlapping_order(
                offer.company_id,
                order.client_party_id,
                offer.stay.check_in,
                offer.stay.check_out,
            )
            .await
            .unwrap();
        assert_eq!(found.map(|o| o.id), Some(order.id));
    }
}
