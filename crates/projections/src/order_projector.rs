//! Downstream projection of confirmed bookings into orders and line items.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{LineItemId, OfferId, OrderId};
use domain::{
    BookingEventKind, BookingOffer, OfferStatus, OrderLineItem, ServiceCategory, TravelOrder,
};
use serde::Serialize;
use store::{EventLog, EventLogExt, EventRecord, OfferStore, OrderLedger, StoreError};
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};

/// Why a confirmed offer was not projected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotConfirmed,
    MissingClient,
    MissingPartnerOrderId,
}

/// Result of projecting one offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProjectionOutcome {
    /// Nothing was written.
    Skipped { reason: SkipReason },

    /// A line item with this offer's reference already exists.
    AlreadyProjected {
        order_id: OrderId,
        line_item_id: LineItemId,
    },

    /// A new line item was written, inside a new or reused order.
    Projected {
        order_id: OrderId,
        line_item_id: LineItemId,
        order_created: bool,
    },
}

impl ProjectionOutcome {
    fn label(&self) -> &'static str {
        match self {
            ProjectionOutcome::Skipped { .. } => "skipped",
            ProjectionOutcome::AlreadyProjected { .. } => "already_projected",
            ProjectionOutcome::Projected { .. } => "projected",
        }
    }
}

/// Turns a `booking_confirmed` offer into a customer order and an
/// accommodation line item.
///
/// Safe to invoke repeatedly for the same offer: the partner order id is
/// used as the line item's reference and checked before inserting. The check
/// is read-then-insert, so two truly simultaneous calls may both insert.
#[derive(Clone)]
pub struct OrderProjector<S> {
    store: S,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl<S> OrderProjector<S>
where
    S: OfferStore + EventLog + OrderLedger,
{
    /// Creates a projector writing to `store`.
    pub fn new(store: S) -> Self {
        Self {
            store,
            position: Arc::new(RwLock::new(ProjectionPosition::zero())),
        }
    }

    /// Loads an offer and projects it.
    pub async fn project_offer(&self, offer_id: OfferId) -> Result<ProjectionOutcome> {
        let offer = self
            .store
            .get_offer(offer_id)
            .await?
            .ok_or(StoreError::OfferNotFound(offer_id))?;
        self.project(&offer).await
    }

    /// Projects a confirmed offer.
    #[tracing::instrument(skip(self, offer), fields(offer_id = %offer.id))]
    pub async fn project(&self, offer: &BookingOffer) -> Result<ProjectionOutcome> {
        let result = self.project_inner(offer).await;

        let label = match &result {
            Ok(outcome) => outcome.label(),
            Err(_) => "error",
        };
        metrics::counter!("downstream_projections_total", "outcome" => label).increment(1);

        result
    }

    async fn project_inner(&self, offer: &BookingOffer) -> Result<ProjectionOutcome> {
        if offer.status != OfferStatus::BookingConfirmed {
            return Ok(skipped(SkipReason::NotConfirmed));
        }
        let Some(client_party_id) = offer.client_party_id else {
            tracing::warn!("Confirmed offer has no client party, skipping projection");
            return Ok(skipped(SkipReason::MissingClient));
        };
        let Some(ref_nr) = offer.partner_order_id.as_deref() else {
            tracing::warn!("Confirmed offer has no partner order id, skipping projection");
            return Ok(skipped(SkipReason::MissingPartnerOrderId));
        };

        let now = Utc::now();
        let existing = self
            .store
            .find_overlapping_order(
                offer.company_id,
                client_party_id,
                offer.stay.check_in,
                offer.stay.check_out,
            )
            .await?;

        let (order_id, order_created) = match existing {
            Some(order) => (order.id, false),
            None => {
                let order = TravelOrder::for_offer(offer, now).ok_or_else(|| {
                    crate::ProjectionError::Projection("offer has no client party".to_string())
                })?;
                let order_id = order.id;
                self.store.insert_order(order).await?;
                tracing::info!(%order_id, "Created order for confirmed booking");
                (order_id, true)
            }
        };

        if let Some(item) = self
            .store
            .find_line_item(order_id, ServiceCategory::Accommodation, ref_nr)
            .await?
        {
            tracing::debug!(%order_id, line_item_id = %item.id, "Line item already projected");
            return Ok(ProjectionOutcome::AlreadyProjected {
                order_id,
                line_item_id: item.id,
            });
        }

        let item = OrderLineItem::accommodation(order_id, offer, ref_nr, now);
        let line_item_id = item.id;
        self.store.insert_line_item(item).await?;

        self.store
            .record_event(
                offer,
                &BookingEventKind::OrderProjected {
                    order_id,
                    line_item_id,
                    order_created,
                },
            )
            .await?;

        tracing::info!(%order_id, %line_item_id, order_created, "Projected confirmed booking");

        Ok(ProjectionOutcome::Projected {
            order_id,
            line_item_id,
            order_created,
        })
    }
}

fn skipped(reason: SkipReason) -> ProjectionOutcome {
    ProjectionOutcome::Skipped { reason }
}

#[async_trait]
impl<S> Projection for OrderProjector<S>
where
    S: OfferStore + EventLog + OrderLedger,
{
    fn name(&self) -> &'static str {
        "OrderProjector"
    }

    /// Projects the offer behind each `booking_confirmed` event. A failure
    /// is logged and skipped; `project_offer` can repair it later.
    async fn handle(&self, event: &EventRecord) -> Result<()> {
        match event.kind() {
            Ok(BookingEventKind::BookingConfirmed { .. }) => {
                if let Err(e) = self.project_offer(event.offer_id).await {
                    tracing::error!(
                        offer_id = %event.offer_id,
                        sequence = event.sequence,
                        error = %e,
                        "Replayed confirmation could not be projected"
                    );
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(sequence = event.sequence, error = %e, "Skipping undecodable event");
            }
        }

        let mut pos = self.position.write().await;
        *pos = pos.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{confirm, sample_offer};
    use store::InMemoryStore;

    async fn confirmed_offer(store: &InMemoryStore) -> BookingOffer {
        let offer = sample_offer();
        store.insert_offer(offer.clone()).await.unwrap();
        confirm(store, offer.id).await
    }

    #[tokio::test]
    async fn test_projects_new_order_and_line_item() {
        let store = InMemoryStore::new();
        let offer = confirmed_offer(&store).await;
        let projector = OrderProjector::new(store.clone());

        let outcome = projector.project(&offer).await.unwrap();
        assert!(matches!(
            outcome,
            ProjectionOutcome::Projected {
                order_created: true,
                ..
            }
        ));
        assert_eq!(store.order_count().await, 1);

        let items = store.line_items_by_ref("HO-1").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].supplier_name, "RateHawk");
        assert_eq!(items[0].client_price, offer.terms.client_amount);

        let events = store.events_for_offer(offer.id).await.unwrap();
        assert_eq!(events.last().unwrap().event_type, "order_projected");
    }

    #[tokio::test]
    async fn test_second_projection_is_noop() {
        let store = InMemoryStore::new();
        let offer = confirmed_offer(&store).await;
        let projector = OrderProjector::new(store.clone());

        projector.project(&offer).await.unwrap();
        let second = projector.project(&offer).await.unwrap();

        assert!(matches!(second, ProjectionOutcome::AlreadyProjected { .. }));
        assert_eq!(store.order_count().await, 1);
        assert_eq!(store.line_item_count().await, 1);
    }

    #[tokio::test]
    async fn test_reuses_overlapping_order() {
        let store = InMemoryStore::new();
        let first = confirmed_offer(&store).await;

        let mut second = crate::testing::sample_offer_with_ref("HO-2");
        second.company_id = first.company_id;
        second.client_party_id = first.client_party_id;
        store.insert_offer(second.clone()).await.unwrap();
        let second = confirm(&store, second.id).await;

        let projector = OrderProjector::new(store.clone());
        let a = projector.project(&first).await.unwrap();
        let b = projector.project(&second).await.unwrap();

        let ProjectionOutcome::Projected { order_id: a_order, .. } = a else {
            panic!("first offer should be projected, got {a:?}");
        };
        let ProjectionOutcome::Projected {
            order_id: b_order,
            order_created,
            ..
        } = b
        else {
            panic!("second offer should be projected, got {b:?}");
        };
        assert_eq!(a_order, b_order);
        assert!(!order_created);
        assert_eq!(store.order_count().await, 1);
        assert_eq!(store.line_item_count().await, 2);
    }

    #[tokio::test]
    async fn test_skips_unconfirmed_offer() {
        let store = InMemoryStore::new();
        let offer = sample_offer();
        store.insert_offer(offer.clone()).await.unwrap();
        let projector = OrderProjector::new(store.clone());

        let outcome = projector.project(&offer).await.unwrap();
        assert_eq!(
            outcome,
            ProjectionOutcome::Skipped {
                reason: SkipReason::NotConfirmed
            }
        );
        assert_eq!(store.line_item_count().await, 0);
    }

    #[tokio::test]
    async fn test_skips_offer_without_client() {
        let store = InMemoryStore::new();
        let mut offer = confirmed_offer(&store).await;
        offer.client_party_id = None;
        let projector = OrderProjector::new(store.clone());

        let outcome = projector.project(&offer).await.unwrap();
        assert_eq!(
            outcome,
            ProjectionOutcome::Skipped {
                reason: SkipReason::MissingClient
            }
        );
    }

    #[tokio::test]
    async fn test_ledger_failure_surfaces_error_without_touching_offer() {
        let store = InMemoryStore::new();
        let offer = confirmed_offer(&store).await;
        store.set_fail_ledger_writes(true);
        let projector = OrderProjector::new(store.clone());

        assert!(projector.project(&offer).await.is_err());

        let stored = store.get_offer(offer.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OfferStatus::BookingConfirmed);
    }

    #[tokio::test]
    async fn test_project_offer_unknown_id() {
        let projector = OrderProjector::new(InMemoryStore::new());
        let result = projector.project_offer(OfferId::new()).await;
        assert!(matches!(
            result,
            Err(crate::ProjectionError::Store(StoreError::OfferNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_handle_only_reacts_to_confirmations() {
        let store = InMemoryStore::new();
        let offer = confirmed_offer(&store).await;
        let projector = OrderProjector::new(store.clone());

        let started = EventRecord::for_offer(
            &offer,
            &BookingEventKind::BookingStarted {
                partner_order_id: "HO-1".to_string(),
            },
        )
        .unwrap();
        projector.handle(&started).await.unwrap();
        assert_eq!(store.line_item_count().await, 0);

        let confirmed = EventRecord::for_offer(
            &offer,
            &BookingEventKind::BookingConfirmed {
                supplier_order_id: None,
                confirmation_number: Some("CONF123".to_string()),
                poll_attempts: 1,
            },
        )
        .unwrap();
        projector.handle(&confirmed).await.unwrap();
        assert_eq!(store.line_item_count().await, 1);
        assert_eq!(projector.position().await.events_processed, 2);
    }

    #[tokio::test]
    async fn test_handle_logs_failed_projection_and_moves_on() {
        let store = InMemoryStore::new();
        let offer = confirmed_offer(&store).await;
        let projector = OrderProjector::new(store.clone());
        store.set_fail_ledger_writes(true);

        let confirmed = EventRecord::for_offer(
            &offer,
            &BookingEventKind::BookingConfirmed {
                supplier_order_id: None,
                confirmation_number: Some("CONF123".to_string()),
                poll_attempts: 1,
            },
        )
        .unwrap();
        projector.handle(&confirmed).await.unwrap();

        assert_eq!(store.line_item_count().await, 0);
        assert_eq!(projector.position().await.events_processed, 1);
    }
}
