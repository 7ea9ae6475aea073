//! Ledger error model.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::id::AccountId;

/// Result type used across the ledger.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-level error.
///
/// Deterministic business failures (validation, missing accounts, funds) are
/// raised before or inside a unit of work; storage failures are folded into
/// `Timeout` and `Internal` by the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Missing or malformed input (no name, no amount, self-transfer, ...).
    #[error("{0}")]
    InvalidRequest(String),

    /// An amount that must be strictly positive was zero or negative.
    #[error("{0}")]
    InvalidAmount(String),

    /// The referenced account does not exist.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// The source account balance is below the requested amount.
    #[error("Insufficient funds")]
    InsufficientFunds {
        account_id: AccountId,
        available: Decimal,
        requested: Decimal,
    },

    /// A row lock could not be acquired within the configured wait.
    #[error("timed out waiting for account lock: {0}")]
    Timeout(String),

    /// Unexpected storage failure. The message is for logs only.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
