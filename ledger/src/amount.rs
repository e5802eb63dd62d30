//! # Coin Amounts
//!
//! Every balance, limit and supply figure in the ledger is a [`Coins`] value:
//! a decimal rounded to [`AMOUNT_DECIMALS`] fractional digits. Floats never
//! appear in arithmetic. On the wire and at rest amounts are decimal strings
//! with exactly six fractional digits (`"30.000000"`), which is what merchant
//! modules parse.
//!
//! Amounts are signed. Balances stay non-negative because the ledger refuses
//! overdrafts, but a spend limit is an allowance counter and may legitimately
//! dip below zero.

use std::fmt;
use std::ops::Neg;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::config::AMOUNT_DECIMALS;

/// Failure to read or compute an amount.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("invalid decimal amount: {0:?}")]
    Malformed(String),

    /// The value cannot carry six fractional digits.
    #[error("amount out of range: {0}")]
    OutOfRange(String),
}

/// A fixed-precision coin amount.
///
/// The magnitude never exceeds [`Coins::MAX`], so every value formats with
/// all six fractional digits and arithmetic can report overflow instead of
/// panicking. There are no `+`/`-` operators; use the checked methods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coins(Decimal);

impl Coins {
    pub const ZERO: Coins = Coins(Decimal::ZERO);

    /// Largest amount: a full 96-bit mantissa at six fractional digits.
    pub const MAX: Coins = Coins(Decimal::from_parts(
        u32::MAX,
        u32::MAX,
        u32::MAX,
        false,
        AMOUNT_DECIMALS,
    ));

    /// Smallest amount, the negation of [`Coins::MAX`].
    pub const MIN: Coins = Coins(Decimal::from_parts(
        u32::MAX,
        u32::MAX,
        u32::MAX,
        true,
        AMOUNT_DECIMALS,
    ));

    /// Wraps a decimal, rounding it to the ledger's precision.
    pub fn try_new(value: Decimal) -> Result<Self, AmountError> {
        let rounded = value.round_dp(AMOUNT_DECIMALS);
        if rounded > Self::MAX.0 || rounded < Self::MIN.0 {
            return Err(AmountError::OutOfRange(value.to_string()));
        }
        Ok(Self(rounded))
    }

    /// A whole number of coins.
    pub fn from_int(value: i64) -> Self {
        Self(Decimal::from(value))
    }

    /// Parses a decimal string such as `"12.5"` or `"-3"`.
    ///
    /// Surrounding whitespace is ignored. Anything else that is not a plain
    /// decimal literal is rejected, as is anything beyond [`Coins::MAX`].
    pub fn parse(text: &str) -> Result<Self, AmountError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AmountError::Malformed(text.to_string()));
        }
        let value =
            Decimal::from_str(trimmed).map_err(|_| AmountError::Malformed(text.to_string()))?;
        Self::try_new(value)
    }

    /// The underlying decimal.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn checked_add(self, other: Coins) -> Option<Coins> {
        self.0
            .checked_add(other.0)
            .and_then(|v| Self::try_new(v).ok())
    }

    pub fn checked_sub(self, other: Coins) -> Option<Coins> {
        self.0
            .checked_sub(other.0)
            .and_then(|v| Self::try_new(v).ok())
    }

    /// Multiplies by an exchange rate (currency units → coins).
    pub fn scale_by(self, rate: Decimal) -> Option<Coins> {
        self.0
            .checked_mul(rate)
            .and_then(|v| Self::try_new(v).ok())
    }

    /// The larger of `self` and zero.
    pub fn clamp_non_negative(self) -> Coins {
        if self.is_negative() {
            Coins::ZERO
        } else {
            self
        }
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = self.0;
        value.rescale(AMOUNT_DECIMALS);
        write!(f, "{value}")
    }
}

impl FromStr for Coins {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<Decimal> for Coins {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl Neg for Coins {
    type Output = Coins;

    fn neg(self) -> Coins {
        Coins(-self.0)
    }
}

// ---------------------------------------------------------------------------
// Serde: always a six-digit decimal string on the way out; strings or
// integers accepted on the way in.
// ---------------------------------------------------------------------------

impl Serialize for Coins {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct CoinsVisitor;

impl<'de> Visitor<'de> for CoinsVisitor {
    type Value = Coins;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal string or an integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Coins, E> {
        Coins::parse(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Coins, E> {
        Ok(Coins::from_int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Coins, E> {
        Coins::try_new(Decimal::from(v)).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Coins {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(CoinsVisitor)
    }
}
