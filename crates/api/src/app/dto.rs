use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use ledgerd_core::money::parse_decimal;
use ledgerd_core::{Account, AccountId, Amount, LedgerError, LedgerResult, Transaction};
use ledgerd_infra::{Movement, Transfer};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub name: Option<String>,
    pub initial_balance: Option<Box<RawValue>>,
}

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: Option<Box<RawValue>>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from: Option<String>,
    pub to: Option<String>,
    pub amount: Option<Box<RawValue>>,
    pub description: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct MovementResponse {
    pub transaction: Transaction,
    pub account: Account,
}

impl From<Movement> for MovementResponse {
    fn from(m: Movement) -> Self {
        Self {
            transaction: m.transaction,
            account: m.account,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub transaction: Transaction,
}

impl From<Transfer> for TransferResponse {
    fn from(t: Transfer) -> Self {
        Self {
            transaction: t.transaction,
        }
    }
}

// -------------------------
// Mapping helpers
// -------------------------

/// Read a decimal from a raw JSON value: a number or a numeric string.
///
/// Works on the literal JSON text, so `0.1` stays exactly `0.1`. `null` and
/// absent fields are `None`.
pub fn decimal_field(raw: Option<&RawValue>) -> LedgerResult<Option<Decimal>> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    let text = raw.get().trim();
    if text == "null" {
        return Ok(None);
    }

    if text.starts_with('"') {
        let s: String = serde_json::from_str(text)
            .map_err(|_| LedgerError::invalid_request("Amount must be a number"))?;
        return parse_decimal(&s).map(Some);
    }

    if text.starts_with(|c: char| c == '-' || c.is_ascii_digit()) {
        return parse_decimal(text).map(Some);
    }

    Err(LedgerError::invalid_request("Amount must be a number"))
}

/// A required amount; absent or `null` is `InvalidRequest`.
pub fn required_amount(raw: Option<&RawValue>) -> LedgerResult<Decimal> {
    decimal_field(raw)?.ok_or_else(|| LedgerError::invalid_request("Amount is required"))
}

/// A required, strictly positive amount. Checked at the edge so that amount
/// errors are reported before anything about the accounts involved.
pub fn positive_amount(raw: Option<&RawValue>) -> LedgerResult<Decimal> {
    let amount = Amount::new(required_amount(raw)?)?;
    Ok(amount.value())
}

/// A required text field; blank counts as absent.
pub fn present(raw: Option<String>) -> Option<String> {
    raw.filter(|v| !v.trim().is_empty())
}

/// Account id supplied by a client. Anything that is not a well-formed id
/// cannot name an existing account.
pub fn parse_account_id(raw: &str) -> Option<AccountId> {
    AccountId::from_str(raw.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> Box<RawValue> {
        RawValue::from_string(json.to_string()).unwrap()
    }

    #[test]
    fn numbers_and_numeric_strings_are_exact() {
        assert_eq!(
            decimal_field(Some(&*raw("0.1"))).unwrap(),
            Some(Decimal::new(1, 1))
        );
        assert_eq!(
            decimal_field(Some(&*raw("\"10.25\""))).unwrap(),
            Some(Decimal::new(1025, 2))
        );
        assert_eq!(
            decimal_field(Some(&*raw("-3"))).unwrap(),
            Some(Decimal::from(-3))
        );
    }

    #[test]
    fn null_and_absent_are_none() {
        assert_eq!(decimal_field(None).unwrap(), None);
        assert_eq!(decimal_field(Some(&*raw("null"))).unwrap(), None);
        assert!(matches!(
            required_amount(None),
            Err(LedgerError::InvalidRequest(_))
        ));
    }

    #[test]
    fn non_numeric_values_are_invalid_requests() {
        for json in ["true", "{}", "[1]", "\"ten\""] {
            assert!(
                matches!(
                    decimal_field(Some(&*raw(json))),
                    Err(LedgerError::InvalidRequest(_))
                ),
                "{json}"
            );
        }
    }

    #[test]
    fn positive_amount_rejects_zero_and_negatives() {
        for json in ["0", "-1", "\"0.00\""] {
            assert!(
                matches!(
                    positive_amount(Some(&*raw(json))),
                    Err(LedgerError::InvalidAmount(_))
                ),
                "{json}"
            );
        }
        assert_eq!(
            positive_amount(Some(&*raw("\"2.50\""))).unwrap(),
            Decimal::new(25, 1)
        );
    }

    #[test]
    fn blank_text_counts_as_absent() {
        assert_eq!(present(Some("  ".to_string())), None);
        assert_eq!(present(None), None);
        assert_eq!(present(Some("x".to_string())), Some("x".to_string()));
    }

    #[test]
    fn request_bodies_keep_amount_text() {
        let body: AmountRequest = serde_json::from_str(r#"{"amount": 19.99}"#).unwrap();
        assert_eq!(
            required_amount(body.amount.as_deref()).unwrap(),
            Decimal::new(1999, 2)
        );
    }
}
