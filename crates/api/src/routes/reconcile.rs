//! Manual reconciliation trigger.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use saga::SweepReport;
use store::BookingStore;

use crate::AppState;
use crate::error::ApiError;

/// POST /reconcile: run one reconciliation sweep now.
#[tracing::instrument(skip(state))]
pub async fn run<S: BookingStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<SweepReport>, ApiError> {
    let report = state.reconciler.sweep(Utc::now()).await?;
    Ok(Json(report))
}
