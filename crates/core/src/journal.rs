//! Journal records: transactions and their debit/credit entries.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::id::{AccountId, EntryId, TransactionId};
use crate::money::Amount;

/// Side of a double-entry line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryType {
    /// Money leaving the account.
    Debit,
    /// Money arriving in the account.
    Credit,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Debit => "DEBIT",
            EntryType::Credit => "CREDIT",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEBIT" => Ok(EntryType::Debit),
            "CREDIT" => Ok(EntryType::Credit),
            other => Err(LedgerError::internal(format!("unknown entry type: {other}"))),
        }
    }
}

/// One logical money movement. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A single debit or credit against one account. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: EntryId,
    pub amount: Amount,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub account_id: AccountId,
    pub transaction_id: TransactionId,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    /// Signed effect of this entry on its account balance.
    pub fn balance_delta(&self) -> rust_decimal::Decimal {
        match self.entry_type {
            EntryType::Debit => self.amount.negated(),
            EntryType::Credit => self.amount.value(),
        }
    }
}

/// An entry joined with its parent transaction (account history view).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryWithTransaction {
    #[serde(flatten)]
    pub entry: Entry,
    pub transaction: Transaction,
}
