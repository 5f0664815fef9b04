//! Money value type
//!
//! Unified representation of wallet amounts and transaction deltas. All
//! amounts crossing the API or the database go through this module.
//!
//! ## Design Principles
//! 1. Exact arithmetic: no floating point anywhere, comparisons are exact
//! 2. Lossless round-trip: `Money::parse(s).to_string()` reparses equal
//! 3. Signed: transaction deltas are negative for balance decreases
//!
//! On the wire a `Money` is its canonical decimal string; in the database it
//! is a `NUMERIC` column.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Neg;
use std::str::FromStr;
use thiserror::Error;

/// Signed exact-decimal amount.
///
/// Inner value is private to force construction through [`Money::parse`] or
/// the checked arithmetic below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, sqlx::Type)]
#[sqlx(transparent)]
pub struct Money(Decimal);

/// Money parsing/arithmetic errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("invalid amount format: {0}")]
    InvalidFormat(String),
}

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Parse a client-provided decimal string.
    ///
    /// Strict: the input is trimmed, must be non-empty, and must be a plain
    /// decimal literal (no exponent notation, no separators). Negative values
    /// are accepted; the sign of a transaction delta drives the arithmetic.
    pub fn parse(input: &str) -> Result<Self, MoneyError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(MoneyError::InvalidFormat("empty string".into()));
        }

        let value =
            Decimal::from_str(input).map_err(|_| MoneyError::InvalidFormat(input.to_string()))?;

        Ok(Money(value))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Exact addition; `None` when the sum leaves the representable range.
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Money)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money(value)
    }
}

// Wire form is the canonical string, never a JSON number.

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Money::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_and_fractional() {
        assert_eq!(Money::parse("100").unwrap().to_string(), "100");
        assert_eq!(Money::parse("100.50").unwrap().to_string(), "100.50");
        assert_eq!(Money::parse("0.0001").unwrap().to_string(), "0.0001");
        assert_eq!(Money::parse(" 42.5 ").unwrap().to_string(), "42.5");
    }

    #[test]
    fn parse_signed() {
        let neg = Money::parse("-75").unwrap();
        assert!(neg.is_negative());
        assert_eq!(neg.to_string(), "-75");

        let pos = Money::parse("75").unwrap();
        assert!(!pos.is_negative());
        assert_eq!(-pos, neg);
    }

    #[test]
    fn parse_rejects_garbage() {
        for case in ["", "  ", "abc", "1,000", "1.2.3", "1e5", "0x10", "1 2"] {
            assert!(Money::parse(case).is_err(), "should reject {:?}", case);
        }
    }

    #[test]
    fn string_roundtrip_is_lossless() {
        for case in [
            "0",
            "100.50",
            "-0.00000001",
            "999999.999999",
            "-123456789.123456789",
        ] {
            let money = Money::parse(case).unwrap();
            let back = Money::parse(&money.to_string()).unwrap();
            assert_eq!(money, back, "roundtrip failed for {}", case);
        }
    }

    #[test]
    fn zero_is_additive_identity() {
        let amount = Money::parse("12.34").unwrap();
        assert_eq!(amount.checked_add(Money::ZERO), Some(amount));
        assert!(Money::ZERO.is_zero());
        assert!(!Money::ZERO.is_negative());
        // -0 normalizes to a non-negative zero
        assert!(!Money::parse("-0").unwrap().is_negative());
    }

    #[test]
    fn checked_add_is_exact() {
        let a = Money::parse("0.1").unwrap();
        let b = Money::parse("0.2").unwrap();
        assert_eq!(a.checked_add(b).unwrap(), Money::parse("0.3").unwrap());

        let balance = Money::parse("50").unwrap();
        let delta = Money::parse("-75").unwrap();
        let sum = balance.checked_add(delta).unwrap();
        assert!(sum.is_negative());
        assert_eq!(sum.to_string(), "-25");
    }

    #[test]
    fn ordering_is_numeric() {
        let low = Money::parse("-1").unwrap();
        let mid = Money::parse("0").unwrap();
        let high = Money::parse("0.5").unwrap();
        assert!(low < mid && mid < high);
        // scale differences do not affect equality
        assert_eq!(Money::parse("1.0").unwrap(), Money::parse("1.00").unwrap());
    }

    #[test]
    fn serde_uses_canonical_string() {
        let money = Money::parse("100.50").unwrap();
        assert_eq!(serde_json::to_string(&money).unwrap(), "\"100.50\"");

        let parsed: Money = serde_json::from_str("\"-12.5\"").unwrap();
        assert_eq!(parsed, Money::parse("-12.5").unwrap());

        assert!(serde_json::from_str::<Money>("\"bogus\"").is_err());
    }
}
