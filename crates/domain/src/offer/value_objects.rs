//! Value objects carried by a booking offer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::state::TariffType;
use crate::error::OfferError;

/// Money amount in minor currency units to avoid floating point issues.
///
/// Supplier amounts arrive as decimal strings ("123.45"); all currencies the
/// agency sells in use two fraction digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    minor: i64,
}

impl Money {
    /// Creates a new amount from minor units (e.g. 50000 = 500.00).
    pub fn from_minor(minor: i64) -> Self {
        Self { minor }
    }

    /// Creates an amount from whole major units.
    pub fn from_major(major: i64) -> Self {
        Self { minor: major * 100 }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { minor: 0 }
    }

    /// Returns the amount in minor units.
    pub fn minor_units(&self) -> i64 {
        self.minor
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.minor > 0
    }

    /// Parses a fixed-point decimal string such as `"123.45"` or `"80"`.
    ///
    /// At most two fraction digits are accepted.
    pub fn parse_decimal(input: &str) -> Result<Self, OfferError> {
        let invalid = || OfferError::InvalidAmount {
            value: input.to_string(),
        };

        let trimmed = input.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (digits, ""),
        };

        if whole.is_empty()
            || fraction.len() > 2
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };

        let minor = whole
            .checked_mul(100)
            .and_then(|m| m.checked_add(fraction))
            .ok_or_else(invalid)?;

        Ok(Self {
            minor: if negative { -minor } else { minor },
        })
    }

    /// Formats the amount as a plain decimal string (`"500.00"`).
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.minor < 0 { "-" } else { "" };
        let abs = self.minor.abs();
        format!("{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            minor: self.minor + rhs.minor,
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            minor: self.minor - rhs.minor,
        }
    }
}

/// ISO 4217 currency code, always upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Validates and normalizes a three-letter currency code.
    pub fn new(code: impl AsRef<str>) -> Result<Self, OfferError> {
        let code = code.as_ref().trim();
        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(OfferError::InvalidCurrency {
                code: code.to_string(),
            });
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// The euro.
    pub fn eur() -> Self {
        Self("EUR".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = OfferError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

/// The stay being booked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayDetails {
    /// Supplier's hotel identifier.
    pub hotel_ref: String,
    pub hotel_name: Option<String>,
    pub hotel_address: Option<String>,
    pub room_name: Option<String>,
    /// Board basis, e.g. "breakfast".
    pub meal: Option<String>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guest_count: u32,
}

impl StayDetails {
    /// Returns true if the stay overlaps the inclusive range `[from, to]`.
    pub fn overlaps(&self, from: NaiveDate, to: NaiveDate) -> bool {
        from <= self.check_out && to >= self.check_in
    }
}

/// Price and rate terms quoted to the client.
///
/// Frozen once the offer's payment status becomes `paid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommercialTerms {
    pub currency: CurrencyCode,
    /// What the agency pays the supplier.
    pub supplier_amount: Money,
    /// What the client pays the agency.
    pub client_amount: Money,
    pub tariff_type: TariffType,
    /// Supplier-issued rate token needed to open a booking form.
    pub book_hash: Option<String>,
}

/// Lead guest contact data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientContact {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Payment terms returned by the supplier when a booking form is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierPaymentTerms {
    /// Supplier payment type, e.g. "deposit" or "now".
    pub payment_type: String,
    pub amount: Money,
    pub currency: CurrencyCode,
}

impl SupplierPaymentTerms {
    /// Returns true if these terms differ from the price quoted to the agency.
    pub fn differs_from(&self, terms: &CommercialTerms) -> bool {
        self.amount != terms.supplier_amount || self.currency != terms.currency
    }
}
