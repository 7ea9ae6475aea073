use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use ledgerd_core::{Account, AccountId, Entry, EntryWithTransaction, LedgerError, Transaction};

/// Storage-layer failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A row lock was not granted within the configured lock timeout.
    #[error("lock wait timed out: {0}")]
    LockTimeout(String),

    /// A balance update would leave the representable decimal range.
    #[error("balance overflow: {0}")]
    BalanceOverflow(String),

    /// A row the caller expected to exist was missing.
    #[error("row not found: {0}")]
    RowNotFound(String),

    /// Any other backend failure (connection, constraint, decoding, ...).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LockTimeout(msg) => LedgerError::Timeout(msg),
            StoreError::BalanceOverflow(_) => LedgerError::invalid_amount("Balance overflow"),
            other => LedgerError::internal(other.to_string()),
        }
    }
}

/// Relational storage for accounts, transactions and entries.
///
/// Reads outside a unit of work see committed data only (read-committed).
/// Every balance mutation goes through [`UnitOfWork`].
///
/// ## Implementations
///
/// - `PostgresLedgerStore`: production, row locks via `SELECT ... FOR UPDATE`
/// - `InMemoryLedgerStore`: tests/dev, row locks via per-account async mutexes
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    /// Open a new all-or-nothing unit of work.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    /// Insert a freshly opened account and return the stored row.
    async fn insert_account(&self, account: &Account) -> Result<Account, StoreError>;

    /// All accounts, newest first.
    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError>;

    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Up to `limit` entries of an account joined with their transactions,
    /// newest first.
    async fn recent_entries(
        &self,
        id: AccountId,
        limit: usize,
    ) -> Result<Vec<EntryWithTransaction>, StoreError>;

    async fn account_exists(&self, id: AccountId) -> Result<bool, StoreError> {
        Ok(self.find_account(id).await?.is_some())
    }
}

/// An open storage transaction.
///
/// Nothing written through a unit of work is visible to others until
/// [`commit`](UnitOfWork::commit). Dropping it without committing discards
/// every write and releases every row lock.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Take exclusive row locks on `ids`, in the given order, and return the
    /// locked rows. Ids without a row are skipped; the caller decides whether
    /// that is an error. Blocks while another unit of work holds a lock.
    async fn lock_accounts(&mut self, ids: &[AccountId]) -> Result<Vec<Account>, StoreError>;

    /// Read an account without locking it (sees this unit's own writes).
    async fn find_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError>;

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), StoreError>;

    async fn insert_entries(&mut self, entries: &[Entry]) -> Result<(), StoreError>;

    /// Atomically add `delta` to an account balance (`balance = balance + delta`)
    /// and return the updated row. Takes the row lock if not already held.
    /// A result outside the decimal range fails with `BalanceOverflow` and
    /// leaves the row unchanged.
    async fn adjust_balance(
        &mut self,
        id: AccountId,
        delta: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Account, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
