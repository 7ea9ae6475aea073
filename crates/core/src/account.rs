use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::id::AccountId;
use crate::journal::EntryWithTransaction;
use crate::money::Amount;

/// How many entries an account lookup returns, newest first.
pub const RECENT_ENTRY_LIMIT: usize = 20;

/// A ledger account with its cached balance.
///
/// `balance` is a projection of the account's entries (plus its opening
/// balance) and is only ever changed inside a ledger unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Build a new account with an opening balance.
    ///
    /// The opening balance is written directly and is not backed by an entry.
    pub fn open(
        name: &str,
        initial_balance: Option<Decimal>,
        at: DateTime<Utc>,
    ) -> LedgerResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::invalid_request("Name is required"));
        }

        let balance = initial_balance.unwrap_or(Decimal::ZERO);
        if balance < Decimal::ZERO {
            return Err(LedgerError::invalid_amount(
                "Initial balance must not be negative",
            ));
        }

        Ok(Self {
            id: AccountId::new(),
            name: name.to_string(),
            balance: balance.normalize(),
            created_at: at,
            updated_at: at,
        })
    }

    /// Fail with `InsufficientFunds` unless the balance covers `amount`.
    pub fn ensure_funds(&self, amount: Amount) -> LedgerResult<()> {
        if self.balance < amount.value() {
            return Err(LedgerError::InsufficientFunds {
                account_id: self.id,
                available: self.balance,
                requested: amount.value(),
            });
        }
        Ok(())
    }
}

/// An account together with its most recent entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountWithEntries {
    #[serde(flatten)]
    pub account: Account,
    pub entries: Vec<EntryWithTransaction>,
}
