//! Payment provider webhook endpoint.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use saga::{SIGNATURE_HEADER, WebhookOutcome};
use store::BookingStore;

use crate::AppState;
use crate::error::ApiError;

/// POST /webhooks/payments: verify and apply a payment provider delivery.
///
/// The raw body is needed for signature verification, so it is taken as
/// bytes and parsed only after the signature checks out.
#[tracing::instrument(skip_all)]
pub async fn payment<S: BookingStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookOutcome>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = state.ingestor.ingest_webhook(&body, signature).await?;
    Ok(Json(outcome))
}
