//! Booking finalization constants and tuning.

use std::time::Duration;

/// Step name: open a booking form with the supplier.
pub const STEP_CREATE_FORM: &str = "create_booking_form";

/// Step name: submit guest details and payment terms.
pub const STEP_START_BOOKING: &str = "start_booking";

/// Step name: poll the supplier for the booking outcome.
pub const STEP_POLL_STATUS: &str = "check_booking_status";

/// Failure message when supplier credentials are missing.
pub const MSG_NOT_CONFIGURED: &str = "Supplier API not configured";

/// Failure message when the offer carries no rate token.
pub const MSG_MISSING_BOOK_HASH: &str = "Missing book_hash";

/// Failure message when polling ran out of attempts.
pub const MSG_CONFIRMATION_TIMED_OUT: &str = "Booking confirmation timed out";

/// Failure message when the supplier reports an error without text.
pub const MSG_SUPPLIER_ERROR_FALLBACK: &str = "Booking failed";

/// Tuning for [`crate::BookingOrchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Sleep before each status check.
    pub poll_interval: Duration,

    /// Status checks before giving up with a timeout.
    pub max_poll_attempts: u32,

    /// Caller IP reported to the supplier when opening a form.
    pub caller_ip: String,

    /// First name sent to the supplier for every booking.
    pub placeholder_first_name: String,

    /// Last name used when the client record has no name.
    pub placeholder_last_name: String,

    /// Email used when the client record has none.
    pub placeholder_email: String,

    /// Phone used when the client record has none.
    pub placeholder_phone: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            max_poll_attempts: 10,
            caller_ip: "127.0.0.1".to_string(),
            placeholder_first_name: "Guest".to_string(),
            placeholder_last_name: "Client".to_string(),
            placeholder_email: "guest@travel-cms.com".to_string(),
            placeholder_phone: "+0000000000".to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the number of status checks.
    pub fn with_max_poll_attempts(mut self, attempts: u32) -> Self {
        self.max_poll_attempts = attempts;
        self
    }

    /// Upper bound on time spent polling.
    pub fn poll_window(&self) -> Duration {
        self.poll_interval * self.max_poll_attempts
    }
}
