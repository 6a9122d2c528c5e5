//! Money type with decimal precision and currency.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! This type wraps `rust_decimal::Decimal` for exact fixed-point arithmetic.
//! Amount equality is `Decimal` equality; there is no tolerance threshold
//! anywhere in the workspace. A sum that is off by the smallest representable
//! unit is unbalanced, not "close enough".

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Represents a monetary amount with currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount, carried at two decimal places (cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: Currency,
}

/// ISO 4217 currency codes supported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// US Dollar
    Usd,
    /// Canadian Dollar
    Cad,
}

impl Money {
    /// Creates a new Money instance.
    #[must_use]
    pub const fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Creates a US-dollar amount.
    #[must_use]
    pub const fn usd(amount: Decimal) -> Self {
        Self {
            amount,
            currency: Currency::Usd,
        }
    }

    /// Creates a zero amount in the specified currency.
    #[must_use]
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Adds another amount of the same currency.
    ///
    /// Returns `None` on a currency mismatch. Mixed-currency arithmetic is a
    /// caller bug that must surface, not a rounding decision.
    #[must_use]
    pub fn checked_add(&self, other: Self) -> Option<Self> {
        (self.currency == other.currency).then(|| Self {
            amount: self.amount + other.amount,
            currency: self.currency,
        })
    }

    /// Subtracts another amount of the same currency.
    #[must_use]
    pub fn checked_sub(&self, other: Self) -> Option<Self> {
        (self.currency == other.currency).then(|| Self {
            amount: self.amount - other.amount,
            currency: self.currency,
        })
    }

    /// Subtracts, flooring the result at zero. Used where a negative result
    /// means "nothing available" rather than a debt.
    #[must_use]
    pub fn saturating_sub(&self, other: Self) -> Option<Self> {
        self.checked_sub(other).map(|m| {
            if m.amount.is_sign_negative() {
                Self::zero(self.currency)
            } else {
                m
            }
        })
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usd => write!(f, "USD"),
            Self::Cad => write!(f, "CAD"),
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USD" => Ok(Self::Usd),
            "CAD" => Ok(Self::Cad),
            _ => Err(format!("Unknown currency: {s}")),
        }
    }
}
