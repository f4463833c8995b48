use common::OfferId;
use domain::OfferError;
use thiserror::Error;

/// Errors that can occur when interacting with the booking store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The offer does not exist.
    #[error("Offer not found: {0}")]
    OfferNotFound(OfferId),

    /// An offer with this id or partner order id already exists.
    #[error("Offer already exists: {0}")]
    DuplicateOffer(OfferId),

    /// A domain rule rejected the change.
    #[error(transparent)]
    Domain(#[from] OfferError),

    /// A stored value could not be mapped back to a domain type.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A simulated write failure (in-memory backend only).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
