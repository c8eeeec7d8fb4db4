use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique identifier for a product record.
///
/// Product IDs are caller-chosen strings (e.g. `"PROD001"`) and serve as
/// the primary key of the stock store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a new product ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Builds the canonical ID for a numeric catalog id (`7` becomes `"PROD007"`).
    pub fn from_catalog_number(number: i64) -> Self {
        Self(format!("PROD{number:03}"))
    }

    /// Returns the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the ID is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of an order in the upstream order-placement system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(i64);

impl OrderId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for OrderId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Error returned when a decimal amount cannot be represented as [`Money`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MoneyError {
    #[error("amount is not a finite number: {0}")]
    NotFinite(f64),

    #[error("amount out of range: {0}")]
    OutOfRange(f64),

    #[error("amount must not be negative: {0}")]
    Negative(f64),

    #[error("amount has more than two decimal places: {0}")]
    SubCent(f64),
}

/// Money amount represented in cents to avoid floating point issues.
///
/// On the wire it is a non-negative decimal number with at most two
/// decimal places (`12.5` is 1250 cents).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "f64", into = "f64")]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Parses a non-negative decimal amount with at most two decimal places.
    ///
    /// The sign is checked before any rounding, so `-0.004` is rejected
    /// rather than becoming zero.
    pub fn from_decimal(amount: f64) -> Result<Self, MoneyError> {
        if !amount.is_finite() {
            return Err(MoneyError::NotFinite(amount));
        }
        if amount < 0.0 {
            return Err(MoneyError::Negative(amount));
        }
        let raw = amount * 100.0;
        let cents = raw.round();
        if cents >= i64::MAX as f64 {
            return Err(MoneyError::OutOfRange(amount));
        }
        // Tolerates binary representation error only (19.99 * 100 = 1998.9999...).
        if (raw - cents).abs() > 1e-6 * raw.max(1.0) {
            return Err(MoneyError::SubCent(amount));
        }
        Ok(Self {
            cents: cents as i64,
        })
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the amount as a decimal number.
    pub fn as_decimal(&self) -> f64 {
        self.cents as f64 / 100.0
    }

    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }
}

impl TryFrom<f64> for Money {
    type Error = MoneyError;

    fn try_from(amount: f64) -> Result<Self, Self::Error> {
        Money::from_decimal(amount)
    }
}

impl From<Money> for f64 {
    fn from(money: Money) -> Self {
        money.as_decimal()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}
