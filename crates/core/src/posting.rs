//! Construction of the records a money movement writes.
//!
//! A `Posting` is one transaction plus its entries, built before any storage
//! access so that every ledger operation writes the same shapes:
//!
//! - withdrawal: one DEBIT
//! - deposit: one CREDIT
//! - transfer: one DEBIT on the source and one CREDIT on the destination,
//!   same amount, same transaction id

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::{LedgerError, LedgerResult};
use crate::id::{AccountId, EntryId, TransactionId};
use crate::journal::{Entry, EntryType, Transaction};
use crate::money::Amount;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub transaction: Transaction,
    pub entries: Vec<Entry>,
}

impl Posting {
    pub fn withdrawal(account_id: AccountId, amount: Amount, at: DateTime<Utc>) -> Self {
        let transaction = new_transaction(format!("Withdrawal from {account_id}"), at);
        let entry = new_entry(&transaction, account_id, EntryType::Debit, amount);
        Self {
            transaction,
            entries: vec![entry],
        }
    }

    pub fn deposit(account_id: AccountId, amount: Amount, at: DateTime<Utc>) -> Self {
        let transaction = new_transaction(format!("Deposit to {account_id}"), at);
        let entry = new_entry(&transaction, account_id, EntryType::Credit, amount);
        Self {
            transaction,
            entries: vec![entry],
        }
    }

    /// A balanced transfer. Blank descriptions fall back to a generated label.
    pub fn transfer(
        from: AccountId,
        to: AccountId,
        amount: Amount,
        description: Option<&str>,
        at: DateTime<Utc>,
    ) -> LedgerResult<Self> {
        ensure_distinct(from, to)?;

        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Transfer from {from} to {to}"));

        let transaction = new_transaction(description, at);
        let debit = new_entry(&transaction, from, EntryType::Debit, amount);
        let credit = new_entry(&transaction, to, EntryType::Credit, amount);
        Ok(Self {
            transaction,
            entries: vec![debit, credit],
        })
    }

    /// Net balance change this posting applies to `account_id`.
    pub fn delta_for(&self, account_id: AccountId) -> Decimal {
        self.entries
            .iter()
            .filter(|e| e.account_id == account_id)
            .map(Entry::balance_delta)
            .sum()
    }

    /// Sum of all entry deltas; zero for transfers.
    pub fn net(&self) -> Decimal {
        self.entries.iter().map(Entry::balance_delta).sum()
    }
}

/// Reject transfers whose source and destination are the same account.
pub fn ensure_distinct(from: AccountId, to: AccountId) -> LedgerResult<()> {
    if from == to {
        return Err(LedgerError::invalid_request(
            "Source and destination accounts must differ",
        ));
    }
    Ok(())
}

fn new_transaction(description: String, at: DateTime<Utc>) -> Transaction {
    Transaction {
        id: TransactionId::new(),
        description: Some(description),
        created_at: at,
    }
}

fn new_entry(
    transaction: &Transaction,
    account_id: AccountId,
    entry_type: EntryType,
    amount: Amount,
) -> Entry {
    Entry {
        id: EntryId::new(),
        amount,
        entry_type,
        account_id,
        transaction_id: transaction.id,
        created_at: transaction.created_at,
    }
}
