use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use ledgerd_core::{
    Account, AccountId, Entry, EntryWithTransaction, Transaction, TransactionId,
};

use super::r#trait::{LedgerStore, StoreError, UnitOfWork};

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    transactions: HashMap<TransactionId, Transaction>,
    entries: Vec<Entry>,
}

#[derive(Debug, Default)]
struct Shared {
    tables: RwLock<Tables>,
    row_locks: Mutex<HashMap<AccountId, Arc<AsyncMutex<()>>>>,
}

impl Shared {
    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn row_lock(&self, id: AccountId) -> Result<Arc<AsyncMutex<()>>, StoreError> {
        let mut locks = self
            .row_locks
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        Ok(locks.entry(id).or_default().clone())
    }
}

/// In-memory ledger store.
///
/// Intended for tests/dev. Emulates the relational store the engine expects:
/// each account row has an exclusive async lock held until commit or rollback,
/// and writes are staged inside the unit of work and applied in one step on
/// commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    shared: Arc<Shared>,
    lock_timeout: Option<Duration>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail lock acquisition with `StoreError::LockTimeout` after `timeout`.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Committed entries of one transaction.
    pub fn transaction_entries(&self, id: TransactionId) -> Result<Vec<Entry>, StoreError> {
        let tables = self.shared.read()?;
        Ok(tables
            .entries
            .iter()
            .filter(|e| e.transaction_id == id)
            .cloned()
            .collect())
    }

    /// Number of committed transactions and entries.
    pub fn journal_size(&self) -> Result<(usize, usize), StoreError> {
        let tables = self.shared.read()?;
        Ok((tables.transactions.len(), tables.entries.len()))
    }

    /// Net balance change recorded in the committed journal for one account:
    /// credits minus debits.
    pub fn journal_net(&self, id: AccountId) -> Result<Decimal, StoreError> {
        let tables = self.shared.read()?;
        tables
            .entries
            .iter()
            .filter(|e| e.account_id == id)
            .try_fold(Decimal::ZERO, |net, e| add_balance(id, net, e.balance_delta()))
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        Ok(Box::new(InMemoryUnitOfWork {
            shared: self.shared.clone(),
            lock_timeout: self.lock_timeout,
            held: HashMap::new(),
            transactions: Vec::new(),
            entries: Vec::new(),
            pending: HashMap::new(),
        }))
    }

    async fn insert_account(&self, account: &Account) -> Result<Account, StoreError> {
        let mut tables = self.shared.write()?;
        if tables.accounts.contains_key(&account.id) {
            return Err(StoreError::Backend(format!(
                "duplicate account id {}",
                account.id
            )));
        }
        tables.accounts.insert(account.id, account.clone());
        Ok(account.clone())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let tables = self.shared.read()?;
        let mut accounts: Vec<Account> = tables.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(accounts)
    }

    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let tables = self.shared.read()?;
        Ok(tables.accounts.get(&id).cloned())
    }

    async fn recent_entries(
        &self,
        id: AccountId,
        limit: usize,
    ) -> Result<Vec<EntryWithTransaction>, StoreError> {
        let tables = self.shared.read()?;
        let mut entries: Vec<&Entry> = tables
            .entries
            .iter()
            .filter(|e| e.account_id == id)
            .collect();
        entries.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        entries
            .into_iter()
            .take(limit)
            .map(|entry| {
                let transaction = tables
                    .transactions
                    .get(&entry.transaction_id)
                    .cloned()
                    .ok_or_else(|| {
                        StoreError::RowNotFound(format!("transaction {}", entry.transaction_id))
                    })?;
                Ok(EntryWithTransaction {
                    entry: entry.clone(),
                    transaction,
                })
            })
            .collect()
    }
}

#[derive(Debug)]
struct PendingBalance {
    delta: Decimal,
    updated_at: DateTime<Utc>,
}

/// Staged writes plus the row locks guarding them.
struct InMemoryUnitOfWork {
    shared: Arc<Shared>,
    lock_timeout: Option<Duration>,
    held: HashMap<AccountId, OwnedMutexGuard<()>>,
    transactions: Vec<Transaction>,
    entries: Vec<Entry>,
    pending: HashMap<AccountId, PendingBalance>,
}

impl InMemoryUnitOfWork {
    async fn acquire(&mut self, id: AccountId) -> Result<(), StoreError> {
        if self.held.contains_key(&id) {
            return Ok(());
        }

        let lock = self.shared.row_lock(id)?;
        let guard = match self.lock_timeout {
            Some(limit) => tokio::time::timeout(limit, lock.lock_owned())
                .await
                .map_err(|_| StoreError::LockTimeout(format!("account {id}")))?,
            None => lock.lock_owned().await,
        };
        self.held.insert(id, guard);
        Ok(())
    }

    /// Committed row with this unit's staged balance change applied.
    fn snapshot(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let tables = self.shared.read()?;
        let Some(mut account) = tables.accounts.get(&id).cloned() else {
            return Ok(None);
        };
        if let Some(p) = self.pending.get(&id) {
            account.balance = add_balance(id, account.balance, p.delta)?;
            account.updated_at = p.updated_at;
        }
        Ok(Some(account))
    }

    fn committed_exists(&self, id: AccountId) -> Result<bool, StoreError> {
        Ok(self.shared.read()?.accounts.contains_key(&id))
    }
}

fn add_balance(id: AccountId, balance: Decimal, delta: Decimal) -> Result<Decimal, StoreError> {
    balance
        .checked_add(delta)
        .ok_or_else(|| StoreError::BalanceOverflow(format!("account {id}")))
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn lock_accounts(&mut self, ids: &[AccountId]) -> Result<Vec<Account>, StoreError> {
        let mut rows = Vec::with_capacity(ids.len());
        for &id in ids {
            // Like `FOR UPDATE`, a missing row locks nothing.
            if !self.committed_exists(id)? {
                continue;
            }
            self.acquire(id).await?;
            if let Some(account) = self.snapshot(id)? {
                rows.push(account);
            }
        }
        Ok(rows)
    }

    async fn find_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.snapshot(id)
    }

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), StoreError> {
        self.transactions.push(transaction.clone());
        Ok(())
    }

    async fn insert_entries(&mut self, entries: &[Entry]) -> Result<(), StoreError> {
        for entry in entries {
            if !self.transactions.iter().any(|t| t.id == entry.transaction_id) {
                return Err(StoreError::Backend(format!(
                    "foreign key violation: transaction {} not found",
                    entry.transaction_id
                )));
            }
            if !self.committed_exists(entry.account_id)? {
                return Err(StoreError::Backend(format!(
                    "foreign key violation: account {} not found",
                    entry.account_id
                )));
            }
        }
        self.entries.extend_from_slice(entries);
        Ok(())
    }

    async fn adjust_balance(
        &mut self,
        id: AccountId,
        delta: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Account, StoreError> {
        // Like an UPDATE matching no row, a missing account locks nothing.
        if !self.committed_exists(id)? {
            return Err(StoreError::RowNotFound(format!("account {id}")));
        }
        // An UPDATE takes the row lock even without a prior FOR UPDATE.
        self.acquire(id).await?;

        let current = self
            .snapshot(id)?
            .ok_or_else(|| StoreError::RowNotFound(format!("account {id}")))?;
        if add_balance(id, current.balance, delta)? < Decimal::ZERO {
            return Err(StoreError::Backend(format!(
                "check constraint violation: balance of account {id} would be negative"
            )));
        }

        let staged = match self.pending.get(&id) {
            Some(p) => add_balance(id, p.delta, delta)?,
            None => delta,
        };
        self.pending.insert(
            id,
            PendingBalance {
                delta: staged,
                updated_at: at,
            },
        );

        self.snapshot(id)?
            .ok_or_else(|| StoreError::RowNotFound(format!("account {id}")))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        {
            let mut tables = this.shared.write()?;
            let mut balances = Vec::with_capacity(this.pending.len());
            for (id, pending) in &this.pending {
                let account = tables
                    .accounts
                    .get(id)
                    .ok_or_else(|| StoreError::RowNotFound(format!("account {id}")))?;
                let balance = add_balance(*id, account.balance, pending.delta)?;
                balances.push((*id, balance, pending.updated_at));
            }
            for (id, balance, updated_at) in balances {
                if let Some(account) = tables.accounts.get_mut(&id) {
                    account.balance = balance;
                    account.updated_at = updated_at;
                }
            }
            for t in this.transactions {
                tables.transactions.insert(t.id, t);
            }
            tables.entries.extend(this.entries);
        }
        // Row locks are released only after the writes are visible.
        drop(this.held);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
