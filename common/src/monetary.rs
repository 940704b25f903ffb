//! Exact-decimal money amounts.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use thiserror::Error;

use crate::currency::Currency;

/// A monetary amount with currency.
///
/// Amounts are carried at full `Decimal` precision; [`Money::round`]
/// quantizes to the currency's minor units for presentation. Serializes as
/// `{"amount": "<decimal string>", "currency": "<CODE>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount value (high precision decimal).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: Currency,
}

impl Money {
    /// Create a new Money instance.
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Create from a string value.
    pub fn from_str(amount: &str, currency: Currency) -> Result<Self, rust_decimal::Error> {
        Ok(Self {
            amount: amount.parse()?,
            currency,
        })
    }

    /// Create a zero amount in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Check if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Check if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Check if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    /// Get the absolute value.
    pub fn abs(&self) -> Self {
        Self {
            amount: self.amount.abs(),
            currency: self.currency.clone(),
        }
    }

    /// Round to the currency's standard decimal places, half away from zero.
    pub fn round(&self) -> Self {
        let places = self.currency.decimal_places();
        Self {
            amount: self
                .amount
                .round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero),
            currency: self.currency.clone(),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.round().amount, self.currency)
    }
}

impl Add for Money {
    type Output = Result<Money, CurrencyMismatchError>;

    fn add(self, other: Money) -> Self::Output {
        if self.currency != other.currency {
            return Err(CurrencyMismatchError {
                expected: self.currency,
                actual: other.currency,
            });
        }
        Ok(Money {
            amount: self.amount + other.amount,
            currency: self.currency,
        })
    }
}

impl Sub for Money {
    type Output = Result<Money, CurrencyMismatchError>;

    fn sub(self, other: Money) -> Self::Output {
        if self.currency != other.currency {
            return Err(CurrencyMismatchError {
                expected: self.currency,
                actual: other.currency,
            });
        }
        Ok(Money {
            amount: self.amount - other.amount,
            currency: self.currency,
        })
    }
}

impl Mul<Decimal> for Money {
    type Output = Money;

    fn mul(self, factor: Decimal) -> Self::Output {
        Money {
            amount: self.amount * factor,
            currency: self.currency,
        }
    }
}

impl Div<Decimal> for Money {
    type Output = Money;

    fn div(self, divisor: Decimal) -> Self::Output {
        Money {
            amount: self.amount / divisor,
            currency: self.currency,
        }
    }
}

/// Error when attempting operations on different currencies.
#[derive(Debug, Clone, Error)]
#[error("Currency mismatch: expected {expected}, got {actual}")]
pub struct CurrencyMismatchError {
    pub expected: Currency,
    pub actual: Currency,
}
