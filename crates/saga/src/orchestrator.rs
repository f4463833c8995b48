//! Booking orchestrator: drives a paid offer to a confirmed or failed booking.

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use common::OfferId;
use domain::{BookingEventKind, BookingOffer, FailureKind, OfferStatus, OfferTransition};
use projections::OrderProjector;
use serde::Serialize;
use store::{EventLog, EventLogExt, OfferStore, OrderLedger};

use crate::booking_finalization::{
    self, MSG_CONFIRMATION_TIMED_OUT, MSG_MISSING_BOOK_HASH, MSG_NOT_CONFIGURED,
    MSG_SUPPLIER_ERROR_FALLBACK, OrchestratorConfig,
};
use crate::error::{Result, SagaError};
use crate::services::supplier::{BookingRequest, BookingStatus, GuestInfo, SupplierClient};

/// Result of one finalization attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FinalizeOutcome {
    /// The offer is not waiting for a booking; nothing was done.
    NotEligible { status: OfferStatus },

    /// Another attempt won the entry guard.
    AlreadyClaimed,

    /// The supplier confirmed the reservation.
    Confirmed {
        confirmation_number: Option<String>,
        poll_attempts: u32,
    },

    /// The booking ended in `booking_failed`.
    Failed { kind: FailureKind, message: String },

    /// The supplier has not decided yet; the offer stays in `booking_started`.
    Pending,
}

/// Anything that can finalize a paid offer.
#[async_trait]
pub trait BookingFinalizer: Send + Sync {
    async fn finalize(&self, offer_id: OfferId) -> Result<FinalizeOutcome>;
}

/// How the supplier leg of a booking ended.
enum Resolution {
    Confirmed {
        confirmation_number: Option<String>,
        supplier_order_id: Option<String>,
        poll_attempts: u32,
    },
    Rejected {
        message: String,
    },
    TimedOut,
}

/// Runs the booking saga for paid offers.
///
/// Ownership of an offer is taken with a single conditional transition into
/// `booking_started`; a caller that loses that race returns without touching
/// the supplier. Every exit path after the guard persists a terminal status,
/// except an offer store outage while persisting it; event log failures
/// after the guard do not stop the saga.
pub struct BookingOrchestrator<S, C> {
    store: S,
    supplier: C,
    projector: OrderProjector<S>,
    config: OrchestratorConfig,
}

impl<S, C> BookingOrchestrator<S, C>
where
    S: OfferStore + EventLog + OrderLedger + Clone,
    C: SupplierClient,
{
    /// Creates an orchestrator with the default tuning.
    pub fn new(store: S, supplier: C) -> Self {
        Self::with_config(store, supplier, OrchestratorConfig::default())
    }

    /// Creates an orchestrator with explicit tuning.
    pub fn with_config(store: S, supplier: C, config: OrchestratorConfig) -> Self {
        let projector = OrderProjector::new(store.clone());
        Self {
            store,
            supplier,
            projector,
            config,
        }
    }

    /// Returns the tuning in use.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Finalizes a paid offer.
    ///
    /// Safe to call any number of times for the same offer: only the first
    /// call that passes the entry guard talks to the supplier.
    #[tracing::instrument(skip(self))]
    pub async fn finalize(&self, offer_id: OfferId) -> Result<FinalizeOutcome> {
        let offer = self
            .store
            .get_offer(offer_id)
            .await?
            .ok_or(SagaError::OfferNotFound(offer_id))?;

        if offer.status != OfferStatus::Paid || !offer.is_paid() {
            tracing::debug!(status = %offer.status, "Offer not eligible for finalization");
            return Ok(FinalizeOutcome::NotEligible {
                status: offer.status,
            });
        }

        metrics::counter!("booking_finalizations_total").increment(1);
        let started_at = Instant::now();

        if !self.supplier.is_configured() {
            return self
                .fail(&offer, FailureKind::Configuration, MSG_NOT_CONFIGURED)
                .await;
        }
        let Some(book_hash) = offer.terms.book_hash.clone().filter(|h| !h.is_empty()) else {
            return self
                .fail(&offer, FailureKind::InvalidInput, MSG_MISSING_BOOK_HASH)
                .await;
        };

        // Entry guard
        let partner_order_id = offer.partner_order_id_or_generate(Utc::now());
        let Some(started) = self
            .store
            .apply_transition(
                offer_id,
                &OfferTransition::BookingStarted {
                    partner_order_id: partner_order_id.clone(),
                },
                Utc::now(),
            )
            .await?
        else {
            tracing::info!("Entry guard rejected, another attempt owns this offer");
            return Ok(FinalizeOutcome::AlreadyClaimed);
        };
        let partner_order_id = started.partner_order_id.clone().unwrap_or(partner_order_id);

        self.audit(
            &started,
            &BookingEventKind::BookingStarted {
                partner_order_id: partner_order_id.clone(),
            },
        )
        .await;
        tracing::info!(%partner_order_id, "Booking started");

        let outcome = match self.book(&started, &book_hash, &partner_order_id).await {
            Ok(Resolution::Confirmed {
                confirmation_number,
                supplier_order_id,
                poll_attempts,
            }) => {
                self.confirm(&started, confirmation_number, supplier_order_id, poll_attempts)
                    .await?
            }
            Ok(Resolution::Rejected { message }) => {
                self.fail(&started, FailureKind::SupplierRejected, &message)
                    .await?
            }
            Ok(Resolution::TimedOut) => {
                self.fail(
                    &started,
                    FailureKind::ConfirmationTimeout,
                    MSG_CONFIRMATION_TIMED_OUT,
                )
                .await?
            }
            Err(e) => {
                tracing::error!(error = %e, "Booking aborted by unexpected error");
                self.fail(&started, FailureKind::Unexpected, &e.to_string())
                    .await?
            }
        };

        metrics::histogram!("booking_finalization_duration_seconds")
            .record(started_at.elapsed().as_secs_f64());
        Ok(outcome)
    }

    /// Resolves an offer stuck in `booking_started` with one status check.
    ///
    /// A supplier that is still processing, or unreachable, leaves the offer
    /// untouched and yields [`FinalizeOutcome::Pending`].
    #[tracing::instrument(skip(self, offer), fields(offer_id = %offer.id))]
    pub async fn resolve_started(&self, offer: &BookingOffer) -> Result<FinalizeOutcome> {
        if offer.status != OfferStatus::BookingStarted {
            return Ok(FinalizeOutcome::NotEligible {
                status: offer.status,
            });
        }
        let Some(partner_order_id) = offer.partner_order_id.as_deref() else {
            tracing::warn!("Started offer has no partner order id");
            return Ok(FinalizeOutcome::Pending);
        };

        match self.supplier.check_booking_status(partner_order_id).await {
            Ok(BookingStatus::Ok {
                confirmation_number,
                supplier_order_id,
            }) => {
                self.confirm(offer, confirmation_number, supplier_order_id, 1)
                    .await
            }
            Ok(BookingStatus::Error { message }) => {
                let message = message.unwrap_or_else(|| MSG_SUPPLIER_ERROR_FALLBACK.to_string());
                self.fail(offer, FailureKind::SupplierRejected, &message)
                    .await
            }
            Ok(BookingStatus::Processing) => Ok(FinalizeOutcome::Pending),
            Err(e) => {
                tracing::warn!(error = %e, "Status check failed, leaving offer for next sweep");
                Ok(FinalizeOutcome::Pending)
            }
        }
    }

    /// Form creation, submission and polling.
    async fn book(
        &self,
        offer: &BookingOffer,
        book_hash: &str,
        partner_order_id: &str,
    ) -> Result<Resolution> {
        tracing::info!(step = booking_finalization::STEP_CREATE_FORM, "saga step started");
        let form = self
            .supplier
            .create_booking_form(book_hash, partner_order_id, &self.config.caller_ip)
            .await?;

        let price_mismatch = form.payment_terms.differs_from(&offer.terms);
        if price_mismatch {
            tracing::warn!(
                quoted = %offer.terms.supplier_amount,
                quoted_currency = %offer.terms.currency,
                supplier = %form.payment_terms.amount,
                supplier_currency = %form.payment_terms.currency,
                "Supplier payment terms differ from quoted price"
            );
        }

        let offer = self
            .store
            .apply_transition(
                offer.id,
                &OfferTransition::SupplierFormRecorded {
                    supplier_order_id: form.supplier_order_id.clone(),
                    terms: form.payment_terms.clone(),
                },
                Utc::now(),
            )
            .await?
            .unwrap_or_else(|| offer.clone());
        self.store
            .record_event(
                &offer,
                &BookingEventKind::BookingFormCreated {
                    supplier_order_id: form.supplier_order_id.clone(),
                    payment_type: form.payment_terms.payment_type.clone(),
                    amount: form.payment_terms.amount,
                    currency: form.payment_terms.currency.clone(),
                    price_mismatch,
                },
            )
            .await?;

        tracing::info!(step = booking_finalization::STEP_START_BOOKING, "saga step started");
        let request = BookingRequest {
            partner_order_id: partner_order_id.to_string(),
            guest: self.guest_for(&offer),
            payment_terms: form.payment_terms,
        };
        self.supplier.start_booking(&request).await?;
        self.store
            .record_event(
                &offer,
                &BookingEventKind::BookingSubmitted {
                    partner_order_id: partner_order_id.to_string(),
                },
            )
            .await?;

        tracing::info!(step = booking_finalization::STEP_POLL_STATUS, "saga step started");
        for attempt in 1..=self.config.max_poll_attempts {
            tokio::time::sleep(self.config.poll_interval).await;
            metrics::counter!("booking_poll_attempts_total").increment(1);

            match self.supplier.check_booking_status(partner_order_id).await? {
                BookingStatus::Ok {
                    confirmation_number,
                    supplier_order_id,
                } => {
                    return Ok(Resolution::Confirmed {
                        confirmation_number,
                        supplier_order_id,
                        poll_attempts: attempt,
                    });
                }
                BookingStatus::Error { message } => {
                    tracing::info!(attempt, "Supplier rejected booking");
                    return Ok(Resolution::Rejected {
                        message: message
                            .unwrap_or_else(|| MSG_SUPPLIER_ERROR_FALLBACK.to_string()),
                    });
                }
                BookingStatus::Processing => {
                    tracing::debug!(attempt, "Booking still processing");
                }
            }
        }

        Ok(Resolution::TimedOut)
    }

    fn guest_for(&self, offer: &BookingOffer) -> GuestInfo {
        let client = &offer.client;
        GuestInfo {
            first_name: self.config.placeholder_first_name.clone(),
            last_name: client
                .name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| self.config.placeholder_last_name.clone()),
            email: client
                .email
                .clone()
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| self.config.placeholder_email.clone()),
            phone: client
                .phone
                .clone()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| self.config.placeholder_phone.clone()),
        }
    }

    async fn confirm(
        &self,
        offer: &BookingOffer,
        confirmation_number: Option<String>,
        supplier_order_id: Option<String>,
        poll_attempts: u32,
    ) -> Result<FinalizeOutcome> {
        let transition = OfferTransition::BookingConfirmed {
            confirmation_number: confirmation_number.clone(),
            supplier_order_id: supplier_order_id.clone(),
        };
        let Some(confirmed) = self
            .store
            .apply_transition(offer.id, &transition, Utc::now())
            .await?
        else {
            tracing::warn!("Offer left booking_started before confirmation was stored");
            return Ok(FinalizeOutcome::AlreadyClaimed);
        };

        self.audit(
            &confirmed,
            &BookingEventKind::BookingConfirmed {
                supplier_order_id: confirmed.supplier_order_id.clone(),
                confirmation_number: confirmation_number.clone(),
                poll_attempts,
            },
        )
        .await;
        metrics::counter!("booking_confirmed_total").increment(1);
        tracing::info!(?confirmation_number, poll_attempts, "Booking confirmed");

        if let Err(e) = self.projector.project(&confirmed).await {
            tracing::error!(error = %e, "Downstream projection failed, booking stays confirmed");
        }

        Ok(FinalizeOutcome::Confirmed {
            confirmation_number,
            poll_attempts,
        })
    }

    async fn fail(
        &self,
        offer: &BookingOffer,
        kind: FailureKind,
        message: &str,
    ) -> Result<FinalizeOutcome> {
        let transition = OfferTransition::BookingFailed {
            kind,
            message: message.to_string(),
        };
        let Some(failed) = self
            .store
            .apply_transition(offer.id, &transition, Utc::now())
            .await?
        else {
            tracing::warn!(%kind, "Offer moved on before failure was stored");
            return Ok(FinalizeOutcome::AlreadyClaimed);
        };

        self.audit(
            &failed,
            &BookingEventKind::BookingFailed {
                kind,
                reason: message.to_string(),
            },
        )
        .await;
        metrics::counter!("booking_failed_total", "reason" => kind.as_str()).increment(1);
        tracing::warn!(%kind, reason = message, "Booking failed");

        Ok(FinalizeOutcome::Failed {
            kind,
            message: message.to_string(),
        })
    }

    /// Appends a lifecycle event once the offer row already holds the state
    /// it describes. The row is authoritative, so a failed append is logged
    /// and the saga carries on.
    async fn audit(&self, offer: &BookingOffer, kind: &BookingEventKind) {
        if let Err(e) = self.store.record_event(offer, kind).await {
            tracing::error!(
                error = %e,
                event_type = kind.event_type(),
                "Failed to append booking event"
            );
        }
    }
}

#[async_trait]
impl<S, C> BookingFinalizer for BookingOrchestrator<S, C>
where
    S: OfferStore + EventLog + OrderLedger + Clone,
    C: SupplierClient,
{
    async fn finalize(&self, offer_id: OfferId) -> Result<FinalizeOutcome> {
        BookingOrchestrator::finalize(self, offer_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::supplier::InMemorySupplierClient;
    use crate::testing::{paid_offer, stored_paid_offer};
    use domain::{CurrencyCode, Money, SupplierPaymentTerms};
    use std::sync::Arc;
    use std::time::Duration;
    use store::{InMemoryStore, OrderLedger};

    type TestOrchestrator = BookingOrchestrator<InMemoryStore, InMemorySupplierClient>;

    fn harness() -> (InMemoryStore, InMemorySupplierClient, TestOrchestrator) {
        let store = InMemoryStore::new();
        let supplier = InMemorySupplierClient::new();
        let orchestrator = BookingOrchestrator::new(store.clone(), supplier.clone());
        (store, supplier, orchestrator)
    }

    async fn event_types(store: &InMemoryStore, id: OfferId) -> Vec<String> {
        store
            .events_for_offer(id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_on_first_poll() {
        let (store, supplier, orchestrator) = harness();
        let offer = stored_paid_offer(&store).await;
        supplier.push_status(BookingStatus::confirmed("CONF123"));

        let outcome = orchestrator.finalize(offer.id).await.unwrap();
        assert_eq!(
            outcome,
            FinalizeOutcome::Confirmed {
                confirmation_number: Some("CONF123".to_string()),
                poll_attempts: 1,
            }
        );

        let stored = store.get_offer(offer.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OfferStatus::BookingConfirmed);
        assert_eq!(stored.confirmation_number.as_deref(), Some("CONF123"));
        assert_eq!(stored.supplier_order_id.as_deref(), Some("RH-0001"));
        assert!(stored.error_message.is_none());
        assert!(stored.booked_at.is_some());

        assert_eq!(store.line_items_by_ref("HO-1").await.unwrap().len(), 1);
        assert_eq!(
            event_types(&store, offer.id).await,
            vec![
                "booking_started",
                "booking_form_created",
                "booking_submitted",
                "booking_confirmed",
                "order_projected",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_supplier_receives_offer_details() {
        let (store, supplier, orchestrator) = harness();
        let offer = stored_paid_offer(&store).await;
        supplier.push_status(BookingStatus::confirmed("CONF123"));

        orchestrator.finalize(offer.id).await.unwrap();

        let form = &supplier.form_calls()[0];
        assert_eq!(form.book_hash, "H1");
        assert_eq!(form.partner_order_id, "HO-1");
        assert_eq!(form.caller_ip, "127.0.0.1");

        let booking = &supplier.bookings()[0];
        assert_eq!(booking.partner_order_id, "HO-1");
        assert_eq!(booking.guest.first_name, "Guest");
        assert_eq!(booking.guest.last_name, "Silva");
        assert_eq!(booking.guest.phone, "+0000000000");
        assert_eq!(booking.payment_terms.payment_type, "deposit");
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_is_bounded() {
        let (store, supplier, orchestrator) = harness();
        let offer = stored_paid_offer(&store).await;

        let began = tokio::time::Instant::now();
        let outcome = orchestrator.finalize(offer.id).await.unwrap();

        assert_eq!(
            outcome,
            FinalizeOutcome::Failed {
                kind: FailureKind::ConfirmationTimeout,
                message: MSG_CONFIRMATION_TIMED_OUT.to_string(),
            }
        );
        assert_eq!(supplier.status_check_count(), 10);
        assert!(began.elapsed() >= Duration::from_secs(30));
        assert!(began.elapsed() < Duration::from_secs(31));

        let stored = store.get_offer(offer.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OfferStatus::BookingFailed);
        assert_eq!(stored.failure_kind, Some(FailureKind::ConfirmationTimeout));
        assert_eq!(store.line_item_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_supplier_error_stops_polling() {
        let (store, supplier, orchestrator) = harness();
        let offer = stored_paid_offer(&store).await;
        supplier.script_statuses([
            BookingStatus::Processing,
            BookingStatus::rejected("No availability"),
        ]);

        let outcome = orchestrator.finalize(offer.id).await.unwrap();

        assert_eq!(
            outcome,
            FinalizeOutcome::Failed {
                kind: FailureKind::SupplierRejected,
                message: "No availability".to_string(),
            }
        );
        assert_eq!(supplier.status_check_count(), 2);
        let stored = store.get_offer(offer.id).await.unwrap().unwrap();
        assert_eq!(stored.error_message.as_deref(), Some("No availability"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_supplier_error_without_message_uses_fallback() {
        let (store, supplier, orchestrator) = harness();
        let offer = stored_paid_offer(&store).await;
        supplier.push_status(BookingStatus::Error { message: None });

        orchestrator.finalize(offer.id).await.unwrap();

        let stored = store.get_offer(offer.id).await.unwrap().unwrap();
        assert_eq!(
            stored.error_message.as_deref(),
            Some(MSG_SUPPLIER_ERROR_FALLBACK)
        );
    }

    #[tokio::test]
    async fn test_unconfigured_supplier_fails_without_calls() {
        let store = InMemoryStore::new();
        let supplier = InMemorySupplierClient::unconfigured();
        let orchestrator = BookingOrchestrator::new(store.clone(), supplier.clone());
        let offer = stored_paid_offer(&store).await;

        let outcome = orchestrator.finalize(offer.id).await.unwrap();

        assert_eq!(
            outcome,
            FinalizeOutcome::Failed {
                kind: FailureKind::Configuration,
                message: MSG_NOT_CONFIGURED.to_string(),
            }
        );
        assert!(supplier.form_calls().is_empty());
        assert_eq!(event_types(&store, offer.id).await, vec!["booking_failed"]);
    }

    #[tokio::test]
    async fn test_missing_book_hash_fails_fast() {
        let (store, supplier, orchestrator) = harness();
        let mut offer = paid_offer();
        offer.terms.book_hash = None;
        store.insert_offer(offer.clone()).await.unwrap();

        let outcome = orchestrator.finalize(offer.id).await.unwrap();

        assert!(matches!(
            outcome,
            FinalizeOutcome::Failed {
                kind: FailureKind::InvalidInput,
                ..
            }
        ));
        assert!(supplier.form_calls().is_empty());
        let stored = store.get_offer(offer.id).await.unwrap().unwrap();
        assert_eq!(stored.error_message.as_deref(), Some(MSG_MISSING_BOOK_HASH));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_becomes_unexpected_failure() {
        let (store, supplier, orchestrator) = harness();
        let offer = stored_paid_offer(&store).await;
        supplier.set_fail_on_start(true);

        let outcome = orchestrator.finalize(offer.id).await.unwrap();

        let FinalizeOutcome::Failed { kind, message } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert_eq!(kind, FailureKind::Unexpected);
        assert!(message.contains("connection reset"));
        assert_eq!(supplier.status_check_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_is_noop() {
        let (store, supplier, orchestrator) = harness();
        let offer = stored_paid_offer(&store).await;
        supplier.push_status(BookingStatus::confirmed("CONF123"));

        orchestrator.finalize(offer.id).await.unwrap();
        let second = orchestrator.finalize(offer.id).await.unwrap();

        assert_eq!(
            second,
            FinalizeOutcome::NotEligible {
                status: OfferStatus::BookingConfirmed
            }
        );
        assert_eq!(supplier.form_calls().len(), 1);
        assert_eq!(supplier.booking_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_book_once() {
        let store = InMemoryStore::new();
        let supplier = InMemorySupplierClient::new();
        let orchestrator = Arc::new(BookingOrchestrator::new(store.clone(), supplier.clone()));
        let offer = stored_paid_offer(&store).await;
        supplier.push_status(BookingStatus::confirmed("CONF123"));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let orchestrator = Arc::clone(&orchestrator);
            handles.push(tokio::spawn(async move {
                orchestrator.finalize(offer.id).await.unwrap()
            }));
        }
        let mut confirmed = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), FinalizeOutcome::Confirmed { .. }) {
                confirmed += 1;
            }
        }

        assert_eq!(confirmed, 1);
        assert_eq!(supplier.booking_count(), 1);
        assert_eq!(store.line_item_count().await, 1);
    }

    #[tokio::test]
    async fn test_unpaid_offer_not_eligible() {
        let (store, supplier, orchestrator) = harness();
        let offer = crate::testing::draft_offer();
        store.insert_offer(offer.clone()).await.unwrap();

        let outcome = orchestrator.finalize(offer.id).await.unwrap();
        assert_eq!(
            outcome,
            FinalizeOutcome::NotEligible {
                status: OfferStatus::Draft
            }
        );
        assert!(supplier.form_calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_offer() {
        let (_, _, orchestrator) = harness();
        let result = orchestrator.finalize(OfferId::new()).await;
        assert!(matches!(result, Err(SagaError::OfferNotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_generated_partner_order_id_is_persisted_and_reused() {
        let (store, supplier, orchestrator) = harness();
        let mut offer = paid_offer();
        offer.partner_order_id = None;
        store.insert_offer(offer.clone()).await.unwrap();
        supplier.push_status(BookingStatus::confirmed("CONF123"));

        orchestrator.finalize(offer.id).await.unwrap();

        let stored = store.get_offer(offer.id).await.unwrap().unwrap();
        let partner_order_id = stored.partner_order_id.unwrap();
        assert!(partner_order_id.starts_with("HO-"));
        assert_eq!(supplier.form_calls()[0].partner_order_id, partner_order_id);
        assert_eq!(supplier.bookings()[0].partner_order_id, partner_order_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_price_mismatch_is_flagged_not_fatal() {
        let (store, supplier, orchestrator) = harness();
        let offer = stored_paid_offer(&store).await;
        supplier.set_form_terms(SupplierPaymentTerms {
            payment_type: "now".to_string(),
            amount: Money::from_major(420),
            currency: CurrencyCode::eur(),
        });
        supplier.push_status(BookingStatus::confirmed("CONF123"));

        let outcome = orchestrator.finalize(offer.id).await.unwrap();
        assert!(matches!(outcome, FinalizeOutcome::Confirmed { .. }));

        let events = store.events_for_offer(offer.id).await.unwrap();
        let form = events
            .iter()
            .find(|e| e.event_type == "booking_form_created")
            .unwrap();
        assert_eq!(form.payload["price_mismatch"], true);

        let stored = store.get_offer(offer.id).await.unwrap().unwrap();
        assert_eq!(
            stored.supplier_terms.unwrap().amount,
            Money::from_major(420)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_projection_failure_keeps_confirmation() {
        let (store, supplier, orchestrator) = harness();
        let offer = stored_paid_offer(&store).await;
        supplier.push_status(BookingStatus::confirmed("CONF123"));
        store.set_fail_ledger_writes(true);

        let outcome = orchestrator.finalize(offer.id).await.unwrap();

        assert!(matches!(outcome, FinalizeOutcome::Confirmed { .. }));
        let stored = store.get_offer(offer.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OfferStatus::BookingConfirmed);
        assert_eq!(store.line_item_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_log_outage_after_guard_still_books() {
        let (store, supplier, orchestrator) = harness();
        let offer = stored_paid_offer(&store).await;
        supplier.push_status(BookingStatus::confirmed("CONF123"));
        store.fail_event_appends("booking_started").await;
        store.fail_event_appends("booking_confirmed").await;

        let outcome = orchestrator.finalize(offer.id).await.unwrap();

        assert!(matches!(outcome, FinalizeOutcome::Confirmed { .. }));
        assert_eq!(supplier.form_calls().len(), 1);
        let stored = store.get_offer(offer.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OfferStatus::BookingConfirmed);
        assert_eq!(store.line_item_count().await, 1);
        assert_eq!(
            event_types(&store, offer.id).await,
            vec!["booking_form_created", "booking_submitted", "order_projected"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_log_outage_mid_saga_ends_failed() {
        let (store, supplier, orchestrator) = harness();
        let offer = stored_paid_offer(&store).await;
        store.fail_event_appends("booking_form_created").await;
        store.fail_event_appends("booking_failed").await;

        let outcome = orchestrator.finalize(offer.id).await.unwrap();

        let FinalizeOutcome::Failed { kind, message } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert_eq!(kind, FailureKind::Unexpected);
        assert!(message.contains("event log down"));
        assert_eq!(supplier.booking_count(), 0);

        let stored = store.get_offer(offer.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OfferStatus::BookingFailed);
        assert!(stored.error_message.unwrap().contains("event log down"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_poll_tuning() {
        let store = InMemoryStore::new();
        let supplier = InMemorySupplierClient::new();
        let config = OrchestratorConfig::default()
            .with_poll_interval(Duration::from_millis(10))
            .with_max_poll_attempts(3);
        let orchestrator = BookingOrchestrator::with_config(store.clone(), supplier.clone(), config);
        let offer = stored_paid_offer(&store).await;

        orchestrator.finalize(offer.id).await.unwrap();
        assert_eq!(supplier.status_check_count(), 3);
    }

    #[tokio::test]
    async fn test_resolve_started_confirms() {
        let (store, supplier, orchestrator) = harness();
        let offer = stored_paid_offer(&store).await;
        let started = store
            .apply_transition(
                offer.id,
                &OfferTransition::BookingStarted {
                    partner_order_id: "HO-1".to_string(),
                },
                Utc::now(),
            )
            .await
            .unwrap()
            .unwrap();
        supplier.push_status(BookingStatus::confirmed("CONF9"));

        let outcome = orchestrator.resolve_started(&started).await.unwrap();
        assert!(matches!(outcome, FinalizeOutcome::Confirmed { .. }));
        assert_eq!(store.line_items_by_ref("HO-1").await.unwrap().len(), 1);
        assert!(supplier.form_calls().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_started_leaves_processing_offer() {
        let (store, supplier, orchestrator) = harness();
        let offer = stored_paid_offer(&store).await;
        let started = store
            .apply_transition(
                offer.id,
                &OfferTransition::BookingStarted {
                    partner_order_id: "HO-1".to_string(),
                },
                Utc::now(),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            orchestrator.resolve_started(&started).await.unwrap(),
            FinalizeOutcome::Pending
        );

        supplier.set_fail_on_status(true);
        assert_eq!(
            orchestrator.resolve_started(&started).await.unwrap(),
            FinalizeOutcome::Pending
        );

        let stored = store.get_offer(offer.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OfferStatus::BookingStarted);
    }
}
