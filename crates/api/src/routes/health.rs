//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use saga::SupplierClient;
use serde::Serialize;
use store::BookingStore;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,

    /// False when no webhook secret is configured and payments cannot arrive.
    pub webhooks_enabled: bool,

    /// False when supplier credentials are missing and bookings will fail.
    pub supplier_configured: bool,
}

/// GET /health: returns service health and configuration gaps.
pub async fn check<S: BookingStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        webhooks_enabled: state.ingestor.accepts_webhooks(),
        supplier_configured: state.supplier.is_configured(),
    })
}
