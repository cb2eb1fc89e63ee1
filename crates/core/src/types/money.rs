//! Amounts in minor currency units and the decimal-safe conversion into them.
//!
//! Clients submit amounts in the major unit (rupees). The gateway and the
//! order store only ever see integer minor units (paise). The conversion
//! scales a [`Decimal`] by 100 and rounds half-up, so `500.005` becomes
//! `50001` paise and no binary floating point is involved.

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minor units per major unit for every supported currency.
const MINOR_PER_MAJOR: i64 = 100;

/// Decimal places of the minor unit.
const MINOR_SCALE: u32 = 2;

/// Errors converting a major-unit amount into minor units.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// Zero or negative amount.
    #[error("amount must be greater than zero")]
    NotPositive,

    /// Positive amount that rounds to zero minor units.
    #[error("amount is smaller than the smallest currency unit")]
    BelowMinorUnit,

    /// Amount does not fit in 64-bit minor units.
    #[error("amount is too large")]
    OutOfRange,
}

/// An integer amount in the smallest currency unit (e.g. paise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MinorUnits(i64);

impl MinorUnits {
    /// Convert a major-unit amount, rounding half-up to the nearest minor unit.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::NotPositive`] for `amount <= 0`,
    /// [`AmountError::BelowMinorUnit`] when the rounded result is zero and
    /// [`AmountError::OutOfRange`] when it overflows `i64`.
    pub fn from_major(amount: Decimal) -> Result<Self, AmountError> {
        if amount <= Decimal::ZERO {
            return Err(AmountError::NotPositive);
        }

        let scaled = amount
            .checked_mul(Decimal::from(MINOR_PER_MAJOR))
            .ok_or(AmountError::OutOfRange)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

        let minor = scaled.to_i64().ok_or(AmountError::OutOfRange)?;
        if minor == 0 {
            return Err(AmountError::BelowMinorUnit);
        }

        Ok(Self(minor))
    }

    /// Wrap a value that is already in minor units.
    #[must_use]
    pub const fn new(minor: i64) -> Self {
        Self(minor)
    }

    /// The raw minor-unit value.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// The exact major-unit value with two decimal places.
    #[must_use]
    pub fn to_major(&self) -> Decimal {
        Decimal::new(self.0, MINOR_SCALE)
    }
}

impl fmt::Display for MinorUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISO 4217 currency codes accepted by the payment flow.
///
/// Orders are only ever raised in rupees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
}

impl CurrencyCode {
    /// The ISO code as sent to the gateway.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::INR => "INR",
        }
    }

    /// Display symbol for notifications.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::INR => "₹",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INR" => Ok(Self::INR),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}

/// An amount together with its currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: MinorUnits,
    pub currency: CurrencyCode,
}

impl Money {
    #[must_use]
    pub const fn new(amount: MinorUnits, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:.2}", self.currency.symbol(), self.amount.to_major())
    }
}
