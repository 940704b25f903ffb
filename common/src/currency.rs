//! ISO 4217 currency codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// ISO 4217 currency code, stored uppercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Create a new currency from code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Get the standard decimal places (minor units) for this currency.
    pub fn decimal_places(&self) -> u32 {
        match self.0.as_str() {
            "JPY" | "KRW" | "VND" => 0,
            "BHD" | "KWD" | "OMR" => 3,
            _ => 2,
        }
    }

    /// Common currencies
    pub fn eur() -> Self {
        Self::new("EUR")
    }

    pub fn usd() -> Self {
        Self::new("USD")
    }

    pub fn gbp() -> Self {
        Self::new("GBP")
    }

    pub fn jpy() -> Self {
        Self::new("JPY")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
