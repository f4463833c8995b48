//! Hotel supplier contract and scripted in-memory implementation.

use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use domain::{CurrencyCode, Money, SupplierPaymentTerms};
use serde::{Deserialize, Serialize};

use crate::error::SupplierError;

/// A booking form opened by the supplier for one rate token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingForm {
    /// The supplier's own order id.
    pub supplier_order_id: String,

    /// Payment terms the supplier expects for this booking.
    pub payment_terms: SupplierPaymentTerms,
}

/// Lead guest identity sent with a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

/// Everything needed to submit a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub partner_order_id: String,
    pub guest: GuestInfo,
    pub payment_terms: SupplierPaymentTerms,
}

/// Outcome of one booking status check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BookingStatus {
    /// The reservation is confirmed.
    Ok {
        confirmation_number: Option<String>,
        supplier_order_id: Option<String>,
    },

    /// No terminal signal yet.
    Processing,

    /// The supplier rejected the booking.
    Error { message: Option<String> },
}

impl BookingStatus {
    /// A confirmation carrying only a confirmation number.
    pub fn confirmed(confirmation_number: impl Into<String>) -> Self {
        BookingStatus::Ok {
            confirmation_number: Some(confirmation_number.into()),
            supplier_order_id: None,
        }
    }

    /// A rejection with the supplier's message.
    pub fn rejected(message: impl Into<String>) -> Self {
        BookingStatus::Error {
            message: Some(message.into()),
        }
    }
}

/// Operations of the external hotel-booking API.
///
/// Every call is keyed by the partner order id and is idempotent on the
/// supplier's side, so retried calls never create a second booking.
#[async_trait]
pub trait SupplierClient: Send + Sync {
    /// Returns false when credentials are missing. No call will succeed.
    fn is_configured(&self) -> bool;

    /// Opens a booking form for a rate token.
    async fn create_booking_form(
        &self,
        book_hash: &str,
        partner_order_id: &str,
        caller_ip: &str,
    ) -> Result<BookingForm, SupplierError>;

    /// Submits the booking. Confirmation arrives asynchronously.
    async fn start_booking(&self, request: &BookingRequest) -> Result<(), SupplierError>;

    /// Checks the booking outcome.
    async fn check_booking_status(
        &self,
        partner_order_id: &str,
    ) -> Result<BookingStatus, SupplierError>;
}

#[async_trait]
impl<T: SupplierClient + ?Sized> SupplierClient for Arc<T> {
    fn is_configured(&self) -> bool {
        (**self).is_configured()
    }

    async fn create_booking_form(
        &self,
        book_hash: &str,
        partner_order_id: &str,
        caller_ip: &str,
    ) -> Result<BookingForm, SupplierError> {
        (**self)
            .create_booking_form(book_hash, partner_order_id, caller_ip)
            .await
    }

    async fn start_booking(&self, request: &BookingRequest) -> Result<(), SupplierError> {
        (**self).start_booking(request).await
    }

    async fn check_booking_status(
        &self,
        partner_order_id: &str,
    ) -> Result<BookingStatus, SupplierError> {
        (**self).check_booking_status(partner_order_id).await
    }
}

/// A recorded `create_booking_form` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormCall {
    pub book_hash: String,
    pub partner_order_id: String,
    pub caller_ip: String,
}

#[derive(Debug)]
struct InMemorySupplierState {
    configured: bool,
    form_terms: SupplierPaymentTerms,
    statuses: VecDeque<BookingStatus>,
    fail_on_form: bool,
    fail_on_start: bool,
    fail_on_status: bool,
    form_calls: Vec<FormCall>,
    bookings: Vec<BookingRequest>,
    status_checks: u32,
    next_id: u32,
}

impl Default for InMemorySupplierState {
    fn default() -> Self {
        Self {
            configured: true,
            form_terms: SupplierPaymentTerms {
                payment_type: "deposit".to_string(),
                amount: Money::from_major(400),
                currency: CurrencyCode::eur(),
            },
            statuses: VecDeque::new(),
            fail_on_form: false,
            fail_on_start: false,
            fail_on_status: false,
            form_calls: Vec::new(),
            bookings: Vec::new(),
            status_checks: 0,
            next_id: 0,
        }
    }
}

/// Scripted supplier for testing.
///
/// Status checks pop from a queue of scripted answers and report
/// `processing` once it is empty.
#[derive(Debug, Clone, Default)]
pub struct InMemorySupplierClient {
    state: Arc<RwLock<InMemorySupplierState>>,
}

impl InMemorySupplierClient {
    /// Creates a configured supplier with no scripted answers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a supplier without credentials.
    pub fn unconfigured() -> Self {
        let client = Self::default();
        client.write().configured = false;
        client
    }

    fn write(&self) -> RwLockWriteGuard<'_, InMemorySupplierState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the payment terms returned by the next booking forms.
    pub fn set_form_terms(&self, terms: SupplierPaymentTerms) {
        self.write().form_terms = terms;
    }

    /// Queues the answer for the next status check.
    pub fn push_status(&self, status: BookingStatus) {
        self.write().statuses.push_back(status);
    }

    /// Queues several answers, in order.
    pub fn script_statuses(&self, statuses: impl IntoIterator<Item = BookingStatus>) {
        self.write().statuses.extend(statuses);
    }

    /// Makes `create_booking_form` fail with a transport error.
    pub fn set_fail_on_form(&self, fail: bool) {
        self.write().fail_on_form = fail;
    }

    /// Makes `start_booking` fail with a transport error.
    pub fn set_fail_on_start(&self, fail: bool) {
        self.write().fail_on_start = fail;
    }

    /// Makes `check_booking_status` fail with a transport error.
    pub fn set_fail_on_status(&self, fail: bool) {
        self.write().fail_on_status = fail;
    }

    /// Returns every booking form request received.
    pub fn form_calls(&self) -> Vec<FormCall> {
        self.write().form_calls.clone()
    }

    /// Returns the number of submitted bookings.
    pub fn booking_count(&self) -> usize {
        self.write().bookings.len()
    }

    /// Returns every submitted booking.
    pub fn bookings(&self) -> Vec<BookingRequest> {
        self.write().bookings.clone()
    }

    /// Returns the number of status checks made.
    pub fn status_check_count(&self) -> u32 {
        self.write().status_checks
    }
}

#[async_trait]
impl SupplierClient for InMemorySupplierClient {
    fn is_configured(&self) -> bool {
        self.write().configured
    }

    async fn create_booking_form(
        &self,
        book_hash: &str,
        partner_order_id: &str,
        caller_ip: &str,
    ) -> Result<BookingForm, SupplierError> {
        let mut state = self.write();
        if !state.configured {
            return Err(SupplierError::NotConfigured);
        }
        state.form_calls.push(FormCall {
            book_hash: book_hash.to_string(),
            partner_order_id: partner_order_id.to_string(),
            caller_ip: caller_ip.to_string(),
        });
        if state.fail_on_form {
            return Err(SupplierError::Transport("connection reset".to_string()));
        }

        state.next_id += 1;
        Ok(BookingForm {
            supplier_order_id: format!("RH-{:04}", state.next_id),
            payment_terms: state.form_terms.clone(),
        })
    }

    async fn start_booking(&self, request: &BookingRequest) -> Result<(), SupplierError> {
        let mut state = self.write();
        if !state.configured {
            return Err(SupplierError::NotConfigured);
        }
        if state.fail_on_start {
            return Err(SupplierError::Transport("connection reset".to_string()));
        }
        state.bookings.push(request.clone());
        Ok(())
    }

    async fn check_booking_status(
        &self,
        _partner_order_id: &str,
    ) -> Result<BookingStatus, SupplierError> {
        let mut state = self.write();
        if !state.configured {
            return Err(SupplierError::NotConfigured);
        }
        state.status_checks += 1;
        if state.fail_on_status {
            return Err(SupplierError::Transport("connection reset".to_string()));
        }
        Ok(state
            .statuses
            .pop_front()
            .unwrap_or(BookingStatus::Processing))
    }
}
