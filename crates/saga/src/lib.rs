//! Booking finalization saga for paid hotel offers.
//!
//! A verified payment webhook (or an agent confirming a bank transfer) marks
//! an offer paid and hands it to the finalization workers. The orchestrator
//! then runs the supplier booking:
//! 1. Create the booking form
//! 2. Start the booking
//! 3. Poll the booking status until it is decided or the poll budget runs out
//!
//! Every run ends in `booking_confirmed` (projected into the order ledger) or
//! `booking_failed`. Offers left behind by a crash or a full queue are picked
//! up by the reconciler.

pub mod booking_finalization;
pub mod dispatcher;
pub mod error;
pub mod ingestor;
pub mod orchestrator;
pub mod reconciler;
pub mod services;
pub mod signature;

#[cfg(test)]
mod testing;

pub use booking_finalization::OrchestratorConfig;
pub use dispatcher::{DispatcherConfig, FinalizationDispatcher};
pub use error::{DispatchError, IngestError, SagaError, SignatureError, SupplierError};
pub use ingestor::{PaymentIngestor, WebhookOutcome};
pub use orchestrator::{BookingFinalizer, BookingOrchestrator, FinalizeOutcome};
pub use reconciler::{Reconciler, ReconcilerConfig, SweepReport};
pub use services::{
    BookingForm, BookingRequest, BookingStatus, GuestInfo, InMemorySupplierClient,
    RateHawkClient, RateHawkConfig, SupplierClient,
};
pub use signature::{SIGNATURE_HEADER, WebhookVerifier};
