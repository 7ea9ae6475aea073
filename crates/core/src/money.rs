//! Exact money amounts.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// A strictly positive, exact decimal amount.
///
/// Every entry amount and every amount passed to a ledger operation goes
/// through this type, so a zero or negative movement cannot be represented.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, LedgerError> {
        if value <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount("Amount must be positive"));
        }
        Ok(Self(value.normalize()))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// The balance delta this amount represents when debited.
    pub fn negated(&self) -> Decimal {
        -self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        Amount::new(value).map_err(serde::de::Error::custom)
    }
}

/// Parse a user-supplied amount without going through floating point.
///
/// Accepts plain decimals (`"10"`, `"10.25"`) and scientific notation
/// (`"1e2"`). Sign and magnitude are not checked here; see [`Amount::new`].
pub fn parse_decimal(raw: &str) -> Result<Decimal, LedgerError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(LedgerError::invalid_request("Amount is required"));
    }
    raw.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|_| LedgerError::invalid_request(format!("Amount is not a valid number: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn zero_and_negative_amounts_are_rejected() {
        for raw in ["0", "0.00", "-1", "-0.01"] {
            let err = Amount::new(dec(raw)).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidAmount(_)), "{raw}");
        }
    }

    #[test]
    fn fractional_amounts_are_exact() {
        let a = Amount::new(dec("0.1")).unwrap();
        let b = Amount::new(dec("0.2")).unwrap();
        assert_eq!(a.value() + b.value(), dec("0.3"));
    }

    #[test]
    fn trailing_zeros_are_normalized() {
        let a = Amount::new(dec("10.500")).unwrap();
        assert_eq!(a.to_string(), "10.5");
    }

    #[test]
    fn parse_decimal_accepts_plain_and_scientific_forms() {
        assert_eq!(parse_decimal(" 12.34 ").unwrap(), dec("12.34"));
        assert_eq!(parse_decimal("1e2").unwrap(), dec("100"));
    }

    #[test]
    fn parse_decimal_rejects_garbage() {
        assert!(matches!(parse_decimal("ten"), Err(LedgerError::InvalidRequest(_))));
        assert!(matches!(parse_decimal(""), Err(LedgerError::InvalidRequest(_))));
    }

    #[test]
    fn deserializing_a_non_positive_amount_fails() {
        assert!(serde_json::from_str::<Amount>("\"0\"").is_err());
        assert_eq!(
            serde_json::from_str::<Amount>("\"5\"").unwrap().value(),
            dec("5")
        );
    }
}
