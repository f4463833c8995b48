//! Offer inspection and manual recovery endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::OfferId;
use domain::BookingOffer;
use projections::ProjectionOutcome;
use serde::{Deserialize, Serialize};
use store::{BookingStore, EventLog, EventQuery, OfferStore};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct InvoicePaidRequest {
    /// Who confirmed the bank transfer.
    pub actor: String,
}

// -- Response types --

/// One entry of an offer's event log.
#[derive(Serialize)]
pub struct EventResponse {
    pub event_id: String,
    pub sequence: i64,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: String,
    pub created_by: Option<String>,
}

// -- Handlers --

/// GET /offers/:id: load an offer.
#[tracing::instrument(skip(state))]
pub async fn get<S: BookingStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<BookingOffer>, ApiError> {
    let offer_id = parse_offer_id(&id)?;
    let offer = state
        .store
        .get_offer(offer_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Offer {id} not found")))?;

    Ok(Json(offer))
}

/// GET /offers/:id/events: list an offer's events, newest first.
#[tracing::instrument(skip(state))]
pub async fn events<S: BookingStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventResponse>>, ApiError> {
    let offer_id = parse_offer_id(&id)?;
    if state.store.get_offer(offer_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Offer {id} not found")));
    }

    let records = state
        .store
        .query_events(EventQuery::for_offer(offer_id).newest_first())
        .await?;

    let responses = records
        .into_iter()
        .map(|e| EventResponse {
            event_id: e.event_id.to_string(),
            sequence: e.sequence,
            event_type: e.event_type,
            payload: e.payload,
            created_at: e.created_at.to_rfc3339(),
            created_by: e.created_by,
        })
        .collect();

    Ok(Json(responses))
}

/// POST /offers/:id/invoice-paid: record a confirmed bank transfer.
#[tracing::instrument(skip(state, req))]
pub async fn invoice_paid<S: BookingStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<InvoicePaidRequest>,
) -> Result<Json<BookingOffer>, ApiError> {
    let offer_id = parse_offer_id(&id)?;
    let actor = req.actor.trim();
    if actor.is_empty() {
        return Err(ApiError::BadRequest("actor is required".to_string()));
    }

    let offer = state
        .ingestor
        .record_invoice_payment(offer_id, actor)
        .await?;
    Ok(Json(offer))
}

/// POST /offers/:id/project: project a confirmed offer into the order ledger again.
#[tracing::instrument(skip(state))]
pub async fn project<S: BookingStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProjectionOutcome>, ApiError> {
    let offer_id = parse_offer_id(&id)?;
    let outcome = state.projector.project_offer(offer_id).await?;
    Ok(Json(outcome))
}

fn parse_offer_id(id: &str) -> Result<OfferId, ApiError> {
    OfferId::parse(id).map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
