//! HTTP client for the RateHawk B2B booking API.

use std::time::Duration;

use async_trait::async_trait;
use domain::{CurrencyCode, Money, SupplierPaymentTerms};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::supplier::{BookingForm, BookingRequest, BookingStatus, SupplierClient};
use crate::error::SupplierError;

/// Production API host.
pub const PRODUCTION_BASE_URL: &str = "https://api.worldota.net";

/// Sandbox API host.
pub const SANDBOX_BASE_URL: &str = "https://api-sandbox.worldota.net";

const FORM_PATH: &str = "/api/b2b/v3/hotel/order/booking/form/";
const FINISH_PATH: &str = "/api/b2b/v3/hotel/order/booking/finish/";
const STATUS_PATH: &str = "/api/b2b/v3/hotel/order/booking/finish/status/";

/// RateHawk client configuration.
#[derive(Debug, Clone)]
pub struct RateHawkConfig {
    pub key_id: Option<String>,
    pub api_key: Option<String>,
    pub base_url: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl RateHawkConfig {
    /// Creates a production configuration. Empty credentials count as missing.
    pub fn new(key_id: Option<String>, api_key: Option<String>) -> Self {
        Self {
            key_id: key_id.filter(|k| !k.is_empty()),
            api_key: api_key.filter(|k| !k.is_empty()),
            base_url: PRODUCTION_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Switches to the sandbox host.
    pub fn with_sandbox(mut self, sandbox: bool) -> Self {
        if sandbox {
            self.base_url = SANDBOX_BASE_URL.to_string();
        }
        self
    }

    /// Overrides the host outright.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Standard response envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct FormRequest<'a> {
    partner_order_id: &'a str,
    book_hash: &'a str,
    language: &'a str,
    user_ip: &'a str,
}

#[derive(Deserialize)]
struct FormData {
    order_id: Value,
    #[serde(default)]
    payment_types: Vec<PaymentTypeData>,
}

#[derive(Serialize, Deserialize)]
struct PaymentTypeData {
    #[serde(rename = "type")]
    payment_type: String,
    amount: Value,
    currency_code: String,
}

#[derive(Serialize)]
struct FinishRequest<'a> {
    user: FinishUser<'a>,
    partner: FinishPartner<'a>,
    language: &'a str,
    rooms: Vec<FinishRoom<'a>>,
    payment_type: PaymentTypeData,
}

#[derive(Serialize)]
struct FinishUser<'a> {
    email: &'a str,
    phone: &'a str,
}

#[derive(Serialize)]
struct FinishPartner<'a> {
    partner_order_id: &'a str,
}

#[derive(Serialize)]
struct FinishRoom<'a> {
    guests: Vec<FinishGuest<'a>>,
}

#[derive(Serialize)]
struct FinishGuest<'a> {
    first_name: &'a str,
    last_name: &'a str,
}

#[derive(Serialize)]
struct StatusRequest<'a> {
    partner_order_id: &'a str,
}

#[derive(Default, Deserialize)]
struct StatusData {
    #[serde(default)]
    order_id: Option<Value>,
    #[serde(default)]
    confirmation_number: Option<String>,
}

/// RateHawk implementation of [`SupplierClient`], using HTTP basic auth.
#[derive(Debug, Clone)]
pub struct RateHawkClient {
    client: Client,
    config: RateHawkConfig,
}

impl RateHawkClient {
    /// Creates a client.
    pub fn new(config: RateHawkConfig) -> Result<Self, SupplierError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SupplierError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Returns the host requests go to.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn credentials(&self) -> Result<(&str, &str), SupplierError> {
        match (&self.config.key_id, &self.config.api_key) {
            (Some(key_id), Some(api_key)) => Ok((key_id, api_key)),
            _ => Err(SupplierError::NotConfigured),
        }
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<Envelope<T>, SupplierError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (key_id, api_key) = self.credentials()?;
        let url = format!("{}{}", self.config.base_url, path);

        let response = self
            .client
            .post(&url)
            .basic_auth(key_id, Some(api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| SupplierError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%url, %status, "Supplier request failed");
            return Err(SupplierError::Http {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        response
            .json::<Envelope<T>>()
            .await
            .map_err(|e| SupplierError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl SupplierClient for RateHawkClient {
    fn is_configured(&self) -> bool {
        self.credentials().is_ok()
    }

    #[tracing::instrument(skip(self, book_hash))]
    async fn create_booking_form(
        &self,
        book_hash: &str,
        partner_order_id: &str,
        caller_ip: &str,
    ) -> Result<BookingForm, SupplierError> {
        let request = FormRequest {
            partner_order_id,
            book_hash,
            language: "en",
            user_ip: caller_ip,
        };
        let envelope: Envelope<FormData> = self.post(FORM_PATH, &request).await?;
        if envelope.status != "ok" {
            return Err(SupplierError::Api(
                envelope
                    .error
                    .unwrap_or_else(|| "Booking form failed".to_string()),
            ));
        }

        let data = envelope
            .data
            .ok_or_else(|| SupplierError::Malformed("booking form without data".to_string()))?;
        let supplier_order_id = scalar_to_string(&data.order_id)
            .ok_or_else(|| SupplierError::Malformed("booking form without order_id".to_string()))?;
        let payment = data
            .payment_types
            .into_iter()
            .next()
            .ok_or_else(|| SupplierError::Malformed("booking form without payment types".to_string()))?;

        let amount = scalar_to_string(&payment.amount)
            .ok_or_else(|| SupplierError::Malformed("payment amount missing".to_string()))?;
        let payment_terms = SupplierPaymentTerms {
            payment_type: payment.payment_type,
            amount: Money::parse_decimal(&amount)
                .map_err(|e| SupplierError::Malformed(e.to_string()))?,
            currency: CurrencyCode::new(&payment.currency_code)
                .map_err(|e| SupplierError::Malformed(e.to_string()))?,
        };

        Ok(BookingForm {
            supplier_order_id,
            payment_terms,
        })
    }

    #[tracing::instrument(skip(self, request), fields(partner_order_id = %request.partner_order_id))]
    async fn start_booking(&self, request: &BookingRequest) -> Result<(), SupplierError> {
        let body = FinishRequest {
            user: FinishUser {
                email: &request.guest.email,
                phone: &request.guest.phone,
            },
            partner: FinishPartner {
                partner_order_id: &request.partner_order_id,
            },
            language: "en",
            rooms: vec![FinishRoom {
                guests: vec![FinishGuest {
                    first_name: &request.guest.first_name,
                    last_name: &request.guest.last_name,
                }],
            }],
            payment_type: PaymentTypeData {
                payment_type: request.payment_terms.payment_type.clone(),
                amount: Value::String(request.payment_terms.amount.to_decimal_string()),
                currency_code: request.payment_terms.currency.to_string(),
            },
        };

        let envelope: Envelope<Value> = self.post(FINISH_PATH, &body).await?;
        if envelope.status != "ok" {
            return Err(SupplierError::Api(
                envelope
                    .error
                    .unwrap_or_else(|| "Booking submission failed".to_string()),
            ));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn check_booking_status(
        &self,
        partner_order_id: &str,
    ) -> Result<BookingStatus, SupplierError> {
        let envelope: Envelope<StatusData> = self
            .post(STATUS_PATH, &StatusRequest { partner_order_id })
            .await?;

        match envelope.status.as_str() {
            "ok" => {
                let data = envelope.data.unwrap_or_default();
                Ok(BookingStatus::Ok {
                    confirmation_number: data.confirmation_number,
                    supplier_order_id: data.order_id.as_ref().and_then(scalar_to_string),
                })
            }
            "processing" => Ok(BookingStatus::Processing),
            "error" => Ok(BookingStatus::Error {
                message: envelope.error,
            }),
            other => Err(SupplierError::Malformed(format!(
                "unknown booking status '{other}'"
            ))),
        }
    }
}

/// Reads a JSON string or number as a string.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
