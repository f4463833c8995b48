//! HTTP API server for booking finalization.
//!
//! Receives payment webhooks, exposes offers and their event log for
//! inspection, and offers manual recovery endpoints, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{OrderProjector, Projection, ProjectionProcessor};
use saga::{
    BookingOrchestrator, FinalizationDispatcher, OrchestratorConfig, PaymentIngestor, Reconciler,
    SupplierClient, WebhookVerifier,
};
use store::BookingStore;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Supplier client shared by the orchestrator and the reconciler.
pub type Supplier = Arc<dyn SupplierClient>;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub store: S,
    pub supplier: Supplier,
    pub ingestor: PaymentIngestor<S>,
    pub reconciler: Arc<Reconciler<S, Supplier>>,
    pub projector: OrderProjector<S>,
}

/// Background pieces the binary drives next to the HTTP server.
pub struct Runtime<S: BookingStore> {
    /// Replays confirmed bookings into the order ledger.
    pub processor: ProjectionProcessor<S>,

    /// Completes once every dispatcher handle is dropped and queued work is done.
    pub workers: JoinHandle<()>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: BookingStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/webhooks/payments", post(routes::webhooks::payment::<S>))
        .route("/offers/{id}", get(routes::offers::get::<S>))
        .route("/offers/{id}/events", get(routes::offers::events::<S>))
        .route(
            "/offers/{id}/invoice-paid",
            post(routes::offers::invoice_paid::<S>),
        )
        .route("/offers/{id}/project", post(routes::offers::project::<S>))
        .route("/reconcile", post(routes::reconcile::run::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the saga around `store` and starts the finalization workers.
pub fn create_state<S: BookingStore + Clone + 'static>(
    store: S,
    supplier: Supplier,
    orchestrator_config: OrchestratorConfig,
    config: &Config,
) -> (Arc<AppState<S>>, Runtime<S>) {
    let orchestrator = Arc::new(BookingOrchestrator::with_config(
        store.clone(),
        supplier.clone(),
        orchestrator_config,
    ));
    let (dispatcher, workers) =
        FinalizationDispatcher::spawn(orchestrator.clone(), config.dispatcher());

    if config.webhook_secret.is_none() {
        tracing::warn!("PAYMENT_WEBHOOK_SECRET not set, every payment webhook will be rejected");
    }
    let verifier = config.webhook_secret.as_deref().map(WebhookVerifier::new);
    let ingestor = PaymentIngestor::new(store.clone(), verifier, dispatcher.clone());

    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        orchestrator,
        dispatcher,
        config.reconciler(),
    ));

    let projector = OrderProjector::new(store.clone());
    let mut processor = ProjectionProcessor::new(store.clone());
    processor.register(Box::new(projector.clone()) as Box<dyn Projection>);

    let state = Arc::new(AppState {
        store,
        supplier,
        ingestor,
        reconciler,
        projector,
    });

    (state, Runtime { processor, workers })
}
