//! Supplier contract and its implementations.

pub mod ratehawk;
pub mod supplier;

pub use ratehawk::{PRODUCTION_BASE_URL, RateHawkClient, RateHawkConfig, SANDBOX_BASE_URL};
pub use supplier::{
    BookingForm, BookingRequest, BookingStatus, FormCall, GuestInfo, InMemorySupplierClient,
    SupplierClient,
};
