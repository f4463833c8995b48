//! Payment webhook ingestion and the manual invoice-payment path.

use std::collections::HashMap;

use chrono::Utc;
use common::OfferId;
use domain::{BookingEventKind, BookingOffer, OfferTransition};
use serde::{Deserialize, Serialize};
use store::{EventLog, EventLogExt, OfferStore, StoreError, WebhookReceipts};

use crate::dispatcher::FinalizationDispatcher;
use crate::error::{DispatchError, IngestError, SignatureError};
use crate::signature::WebhookVerifier;

/// Event type signalling a finished checkout.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Metadata key carrying the offer id.
pub const OFFER_METADATA_KEY: &str = "hotel_offer_id";

/// What a webhook delivery did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// This provider event id was processed before.
    Duplicate,

    /// Verified, but not a paid checkout for a known, payable offer.
    Ignored { reason: String },

    /// The offer moved to `paid` and finalization was queued.
    Paid { offer_id: OfferId },

    /// The offer was already paid; finalization was queued again.
    AlreadyPaid { offer_id: OfferId },
}

impl WebhookOutcome {
    fn label(&self) -> &'static str {
        match self {
            WebhookOutcome::Duplicate => "duplicate",
            WebhookOutcome::Ignored { .. } => "ignored",
            WebhookOutcome::Paid { .. } => "paid",
            WebhookOutcome::AlreadyPaid { .. } => "already_paid",
        }
    }
}

#[derive(Debug, Deserialize)]
struct PaymentEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: PaymentEventData,
}

#[derive(Debug, Deserialize)]
struct PaymentEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    payment_intent: Option<PaymentIntentRef>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// The provider sends either the bare id or the expanded object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PaymentIntentRef {
    Id(String),
    Object { id: String },
}

impl PaymentIntentRef {
    fn into_id(self) -> String {
        match self {
            PaymentIntentRef::Id(id) | PaymentIntentRef::Object { id } => id,
        }
    }
}

/// Marks offers paid and hands them to the finalization workers.
///
/// Only a verified delivery can change state. Booking failures never
/// surface here; they are visible on the offer itself.
pub struct PaymentIngestor<S> {
    store: S,
    verifier: Option<WebhookVerifier>,
    dispatcher: FinalizationDispatcher,
}

impl<S> PaymentIngestor<S>
where
    S: OfferStore + EventLog + WebhookReceipts,
{
    /// Creates an ingestor. Without a verifier every webhook is rejected.
    pub fn new(
        store: S,
        verifier: Option<WebhookVerifier>,
        dispatcher: FinalizationDispatcher,
    ) -> Self {
        Self {
            store,
            verifier,
            dispatcher,
        }
    }

    /// Returns false when no secret is configured.
    pub fn accepts_webhooks(&self) -> bool {
        self.verifier.is_some()
    }

    /// Processes one raw webhook delivery.
    #[tracing::instrument(skip_all, fields(provider_event_id = tracing::field::Empty))]
    pub async fn ingest_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, IngestError> {
        let result = self.ingest(payload, signature).await;

        let label = match &result {
            Ok(outcome) => outcome.label(),
            Err(IngestError::Signature(_)) => "rejected",
            Err(IngestError::MalformedPayload(_)) => "malformed",
            Err(_) => "error",
        };
        metrics::counter!("payment_webhooks_total", "outcome" => label).increment(1);

        result
    }

    async fn ingest(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, IngestError> {
        let signature = signature.ok_or(SignatureError::Missing)?;
        let verifier = self
            .verifier
            .as_ref()
            .ok_or(SignatureError::SecretNotConfigured)?;
        if let Err(e) = verifier.verify(payload, signature) {
            tracing::warn!(error = %e, "Webhook signature verification failed");
            return Err(e.into());
        }

        let event: PaymentEvent = serde_json::from_slice(payload)
            .map_err(|e| IngestError::MalformedPayload(e.to_string()))?;
        tracing::Span::current().record("provider_event_id", event.id.as_str());

        if self.store.has_delivery(&event.id).await? {
            tracing::info!(provider_event_id = %event.id, "Duplicate webhook delivery");
            return Ok(WebhookOutcome::Duplicate);
        }

        let (outcome, offer_id) = self.apply_event(&event).await?;
        self.store
            .record_delivery(&event.id, offer_id, Utc::now())
            .await?;

        if let WebhookOutcome::Paid { offer_id } | WebhookOutcome::AlreadyPaid { offer_id } =
            &outcome
        {
            self.queue_finalization(*offer_id);
        }

        Ok(outcome)
    }

    async fn apply_event(
        &self,
        event: &PaymentEvent,
    ) -> Result<(WebhookOutcome, Option<OfferId>), IngestError> {
        if event.event_type != CHECKOUT_COMPLETED {
            return Ok((ignored(format!("event type {}", event.event_type)), None));
        }

        let session: CheckoutSession = serde_json::from_value(event.data.object.clone())
            .map_err(|e| IngestError::MalformedPayload(e.to_string()))?;
        if session.payment_status.as_deref() != Some("paid") {
            return Ok((ignored("checkout not paid".to_string()), None));
        }
        let Some(raw_id) = session.metadata.get(OFFER_METADATA_KEY) else {
            return Ok((ignored("no offer in metadata".to_string()), None));
        };
        let Ok(offer_id) = OfferId::parse(raw_id) else {
            tracing::warn!(%raw_id, "Webhook metadata carries an invalid offer id");
            return Ok((ignored("invalid offer id".to_string()), None));
        };

        let checkout_session_id = session.id;
        let payment_intent_id = session.payment_intent.map(PaymentIntentRef::into_id);
        let transition = OfferTransition::PaymentReceived {
            checkout_session_id: checkout_session_id.clone(),
            payment_intent_id: payment_intent_id.clone(),
        };
        let paid = match self
            .store
            .apply_transition(offer_id, &transition, Utc::now())
            .await
        {
            Ok(paid) => paid,
            Err(StoreError::OfferNotFound(_)) => {
                tracing::warn!(%offer_id, "Paid checkout for unknown offer");
                return Ok((ignored("unknown offer".to_string()), None));
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(paid) = paid {
            self.store
                .record_event(
                    &paid,
                    &BookingEventKind::PaymentSucceeded {
                        provider_event_id: Some(event.id.clone()),
                        checkout_session_id,
                        payment_intent_id,
                    },
                )
                .await?;
            tracing::info!(%offer_id, "Offer marked paid");
            return Ok((WebhookOutcome::Paid { offer_id }, Some(offer_id)));
        }

        let offer = self
            .store
            .get_offer(offer_id)
            .await?
            .ok_or(IngestError::OfferNotFound(offer_id))?;
        if offer.is_paid() {
            tracing::info!(%offer_id, status = %offer.status, "Offer already paid");
            Ok((WebhookOutcome::AlreadyPaid { offer_id }, Some(offer_id)))
        } else {
            tracing::warn!(%offer_id, status = %offer.status, "Paid checkout for offer that cannot take payment");
            Ok((ignored(format!("offer is {}", offer.status)), Some(offer_id)))
        }
    }

    /// Records a bank transfer confirmed by `actor` and queues finalization.
    #[tracing::instrument(skip(self))]
    pub async fn record_invoice_payment(
        &self,
        offer_id: OfferId,
        actor: &str,
    ) -> Result<BookingOffer, IngestError> {
        let applied = self
            .store
            .apply_transition(offer_id, &OfferTransition::InvoicePaid, Utc::now())
            .await
            .map_err(|e| match e {
                StoreError::OfferNotFound(id) => IngestError::OfferNotFound(id),
                other => other.into(),
            })?;
        let Some(paid) = applied else {
            let status = self
                .store
                .get_offer(offer_id)
                .await?
                .ok_or(IngestError::OfferNotFound(offer_id))?
                .status;
            return Err(IngestError::NotInvoicePending { offer_id, status });
        };

        self.store
            .record_event_by(&paid, &BookingEventKind::InvoicePaid, actor)
            .await?;
        tracing::info!(%offer_id, actor, "Invoice payment recorded");

        self.queue_finalization(offer_id);
        Ok(paid)
    }

    /// Hands `offer_id` to the workers. A job that cannot be queued stays
    /// `paid` and is picked up by the reconciler.
    fn queue_finalization(&self, offer_id: OfferId) {
        match self.dispatcher.dispatch(offer_id) {
            Ok(()) | Err(DispatchError::QueueFull(_)) => {}
            Err(e @ DispatchError::Closed) => {
                tracing::error!(%offer_id, error = %e, "Finalization not queued, offer left for reconciliation");
            }
        }
    }
}

fn ignored(reason: String) -> WebhookOutcome {
    tracing::debug!(%reason, "Webhook ignored");
    WebhookOutcome::Ignored { reason }
}
