//! Fixed-point decimal types for amounts, factors, and prices
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! All monetary values carry up to [`SCALE`] fractional digits; multiply and
//! divide truncate toward zero at that scale, so rounding dust stays with the
//! protocol instead of leaking to users.

use crate::errors::NumericError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of fractional decimal places carried by all monetary values
pub const SCALE: u32 = 18;

/// Truncate toward zero at [`SCALE`] decimal places
pub fn truncate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(SCALE, RoundingStrategy::ToZero)
}

/// Checked multiply, truncating the product toward zero at [`SCALE`] places
pub fn mul_truncate(lhs: Decimal, rhs: Decimal) -> Result<Decimal, NumericError> {
    lhs.checked_mul(rhs)
        .map(truncate)
        .ok_or(NumericError::Overflow)
}

/// Checked divide, truncating the quotient toward zero at [`SCALE`] places
pub fn div_truncate(lhs: Decimal, rhs: Decimal) -> Result<Decimal, NumericError> {
    if rhs.is_zero() {
        return Err(NumericError::DivisionByZero);
    }
    lhs.checked_div(rhs)
        .map(truncate)
        .ok_or(NumericError::Overflow)
}

/// Non-negative quantity of an asset (underlying, receipt, or reward tokens)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    /// The zero amount
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Try to create an amount, returning None if negative
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value < Decimal::ZERO {
            None
        } else {
            Some(Self(truncate(value)))
        }
    }

    /// Convert a computed decimal, rejecting negative results as underflow
    pub fn try_from_decimal(value: Decimal) -> Result<Self, NumericError> {
        Self::try_new(value).ok_or(NumericError::Underflow)
    }

    /// Create an amount from a whole number of units
    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    /// Parse an amount from a decimal string
    pub fn from_str(s: &str) -> Option<Self> {
        Decimal::from_str_exact(s).ok().and_then(Self::try_new)
    }

    /// Get the inner decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// True if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checked addition
    pub fn checked_add(self, rhs: Self) -> Result<Self, NumericError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(NumericError::Overflow)
    }

    /// Checked subtraction, erroring on results below zero
    pub fn checked_sub(self, rhs: Self) -> Result<Self, NumericError> {
        if rhs.0 > self.0 {
            Err(NumericError::Underflow)
        } else {
            Ok(Self(self.0 - rhs.0))
        }
    }

    /// Subtraction clamped at zero
    pub fn saturating_sub(self, rhs: Self) -> Self {
        if rhs.0 >= self.0 {
            Self::zero()
        } else {
            Self(self.0 - rhs.0)
        }
    }

    /// The smaller of two amounts
    pub fn min(self, other: Self) -> Self {
        if other.0 < self.0 {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-negative fixed-point multiplier
///
/// Used for interest rates, collateral/close/reserve factors, exchange
/// rates, and cumulative indices.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Factor(Decimal);

impl Factor {
    /// The zero factor
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// The identity factor (1.0)
    pub fn one() -> Self {
        Self(Decimal::ONE)
    }

    /// Try to create a factor, returning None if negative
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value < Decimal::ZERO {
            None
        } else {
            Some(Self(truncate(value)))
        }
    }

    /// Convert a computed decimal, rejecting negative results as underflow
    pub fn try_from_decimal(value: Decimal) -> Result<Self, NumericError> {
        Self::try_new(value).ok_or(NumericError::Underflow)
    }

    /// Parse a factor from a decimal string
    pub fn from_str(s: &str) -> Option<Self> {
        Decimal::from_str_exact(s).ok().and_then(Self::try_new)
    }

    /// Get the inner decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// True if the factor is zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strictly positive oracle price, quoted per unit of the underlying asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Try to create a price, returning None unless strictly positive
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value <= Decimal::ZERO {
            None
        } else {
            Some(Self(truncate(value)))
        }
    }

    /// Create a price from a whole number of quote units
    ///
    /// # Panics
    /// Panics if the value is zero
    pub fn from_u64(value: u64) -> Self {
        assert!(value > 0, "Price must be positive");
        Self(Decimal::from(value))
    }

    /// Parse a price from a decimal string
    pub fn from_str(s: &str) -> Option<Self> {
        Decimal::from_str_exact(s).ok().and_then(Self::try_new)
    }

    /// Get the inner decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
