//! Saga error types.

use common::OfferId;
use domain::OfferStatus;
use store::StoreError;
use thiserror::Error;

/// Errors raised by a supplier client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SupplierError {
    /// Credentials are missing; no request was sent.
    #[error("Supplier API not configured")]
    NotConfigured,

    /// The request never produced a response.
    #[error("Supplier transport error: {0}")]
    Transport(String),

    /// The supplier answered with a non-success HTTP status.
    #[error("Supplier request failed: {status} {body}")]
    Http { status: u16, body: String },

    /// The supplier answered `status != ok` to a synchronous call.
    #[error("Supplier error: {0}")]
    Api(String),

    /// The response could not be interpreted.
    #[error("Malformed supplier response: {0}")]
    Malformed(String),
}

/// Errors from payment webhook signature verification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing signature")]
    Missing,

    #[error("Webhook secret not configured")]
    SecretNotConfigured,

    #[error("Malformed signature header")]
    Malformed,

    #[error("Signature timestamp outside tolerance")]
    Expired,

    #[error("Invalid signature")]
    Mismatch,
}

/// Errors from the payment ingestion paths.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Signature verification failed; nothing was written.
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// The verified payload is not a payment event we can read.
    #[error("Malformed payment event: {0}")]
    MalformedPayload(String),

    #[error("Offer not found: {0}")]
    OfferNotFound(OfferId),

    /// The offer is not waiting for an invoice payment.
    #[error("Offer {offer_id} is {status}, expected invoice_pending")]
    NotInvoicePending {
        offer_id: OfferId,
        status: OfferStatus,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from handing work to the finalization workers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The queue is at capacity; the job was dropped.
    #[error("Finalization queue full, offer {0} not queued")]
    QueueFull(OfferId),

    /// The workers have shut down.
    #[error("Finalization dispatcher closed")]
    Closed,
}

/// Errors that can occur while finalizing a booking.
#[derive(Debug, Error)]
pub enum SagaError {
    #[error("Offer not found: {0}")]
    OfferNotFound(OfferId),

    /// Supplier call failed.
    #[error(transparent)]
    Supplier(#[from] SupplierError),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
