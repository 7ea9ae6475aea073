//! Ledger engine: withdraw, deposit and transfer as atomic units of work.
//!
//! ## Locking
//!
//! - withdraw locks the account row before reading its balance
//! - transfer locks both rows, in ascending id order, before reading either
//! - deposit takes no read lock; its balance update is an atomic increment
//!
//! All cross-request safety comes from the store's row locks. The engine holds
//! no mutex of its own and never retries.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use ledgerd_core::posting::ensure_distinct;
use ledgerd_core::{
    Account, AccountId, Amount, Entry, LedgerError, LedgerResult, Posting, Transaction, time,
};

use crate::store::{LedgerStore, UnitOfWork};

/// Future returned by a unit-of-work closure; borrows the open unit of work.
pub type UnitFuture<'a, T> = Pin<Box<dyn Future<Output = LedgerResult<T>> + Send + 'a>>;

/// Result of a withdrawal or deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movement {
    pub transaction: Transaction,
    pub entry: Entry,
    /// Account state right after the movement committed.
    pub account: Account,
}

/// Result of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub transaction: Transaction,
    /// DEBIT on the source, then CREDIT on the destination.
    pub entries: Vec<Entry>,
    pub from: Account,
    pub to: Account,
}

#[derive(Clone)]
pub struct LedgerEngine {
    store: Arc<dyn LedgerStore>,
}

impl LedgerEngine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Run `work` as one all-or-nothing unit of work.
    ///
    /// Row locks on `lock` are taken in ascending id order (duplicates
    /// collapsed) before `work` runs, and `work` receives the rows that
    /// exist. `Ok` commits; `Err` rolls back and is returned unchanged.
    pub async fn atomically<T, F>(&self, lock: &[AccountId], work: F) -> LedgerResult<T>
    where
        T: Send,
        F: for<'a> FnOnce(&'a mut dyn UnitOfWork, Vec<Account>) -> UnitFuture<'a, T> + Send,
    {
        let order = lock_order(lock);
        let mut uow = self.store.begin().await?;

        let locked = uow.lock_accounts(&order).await;
        let locked = match locked {
            Ok(rows) => rows,
            Err(e) => {
                rollback_quietly(uow).await;
                return Err(e.into());
            }
        };

        let outcome = work(uow.as_mut(), locked).await;
        match outcome {
            Ok(value) => {
                uow.commit().await?;
                Ok(value)
            }
            Err(err) => {
                rollback_quietly(uow).await;
                Err(err)
            }
        }
    }

    #[instrument(skip(self, account_id, amount), fields(account_id = %account_id, amount = %amount))]
    pub async fn withdraw(&self, account_id: AccountId, amount: Decimal) -> LedgerResult<Movement> {
        let amount = Amount::new(amount)?;

        let movement = self
            .atomically(&[account_id], move |uow, locked| {
                Box::pin(post_withdrawal(uow, locked, account_id, amount))
            })
            .await?;

        info!(
            transaction_id = %movement.transaction.id,
            balance = %movement.account.balance,
            "withdrawal posted"
        );
        Ok(movement)
    }

    #[instrument(skip(self, account_id, amount), fields(account_id = %account_id, amount = %amount))]
    pub async fn deposit(&self, account_id: AccountId, amount: Decimal) -> LedgerResult<Movement> {
        let amount = Amount::new(amount)?;

        let movement = self
            .atomically(&[], move |uow, _| {
                Box::pin(post_deposit(uow, account_id, amount))
            })
            .await?;

        info!(
            transaction_id = %movement.transaction.id,
            balance = %movement.account.balance,
            "deposit posted"
        );
        Ok(movement)
    }

    #[instrument(
        skip(self, from, to, amount, description),
        fields(from = %from, to = %to, amount = %amount)
    )]
    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        description: Option<String>,
    ) -> LedgerResult<Transfer> {
        let amount = Amount::new(amount)?;
        ensure_distinct(from, to)?;

        let transfer = self
            .atomically(&[from, to], move |uow, locked| {
                Box::pin(post_transfer(uow, locked, from, to, amount, description))
            })
            .await?;

        info!(
            transaction_id = %transfer.transaction.id,
            from_balance = %transfer.from.balance,
            to_balance = %transfer.to.balance,
            "transfer posted"
        );
        Ok(transfer)
    }
}

/// Sorted, de-duplicated lock order.
pub fn lock_order(ids: &[AccountId]) -> Vec<AccountId> {
    let mut order = ids.to_vec();
    order.sort();
    order.dedup();
    order
}

async fn rollback_quietly(uow: Box<dyn UnitOfWork>) {
    if let Err(e) = uow.rollback().await {
        warn!(error = %e, "rollback failed");
    }
}

fn take_locked(locked: &[Account], id: AccountId) -> LedgerResult<Account> {
    locked
        .iter()
        .find(|a| a.id == id)
        .cloned()
        .ok_or(LedgerError::AccountNotFound(id))
}

/// Write a posting's transaction and entries, then apply each account's net
/// delta. Returns the updated accounts in first-entry order.
async fn write_posting(uow: &mut dyn UnitOfWork, posting: &Posting) -> LedgerResult<Vec<Account>> {
    uow.insert_transaction(&posting.transaction).await?;
    uow.insert_entries(&posting.entries).await?;

    let mut touched: Vec<AccountId> = Vec::with_capacity(posting.entries.len());
    for entry in &posting.entries {
        if !touched.contains(&entry.account_id) {
            touched.push(entry.account_id);
        }
    }

    let mut updated = Vec::with_capacity(touched.len());
    for id in touched {
        let account = uow
            .adjust_balance(id, posting.delta_for(id), posting.transaction.created_at)
            .await?;
        updated.push(account);
    }
    Ok(updated)
}

fn single_movement(posting: Posting, mut accounts: Vec<Account>) -> LedgerResult<Movement> {
    let account = accounts
        .pop()
        .ok_or_else(|| LedgerError::internal("posting updated no account"))?;
    let entry = posting
        .entries
        .into_iter()
        .next()
        .ok_or_else(|| LedgerError::internal("posting has no entry"))?;
    Ok(Movement {
        transaction: posting.transaction,
        entry,
        account,
    })
}

async fn post_withdrawal(
    uow: &mut dyn UnitOfWork,
    locked: Vec<Account>,
    account_id: AccountId,
    amount: Amount,
) -> LedgerResult<Movement> {
    let account = take_locked(&locked, account_id)?;
    account.ensure_funds(amount)?;

    let posting = Posting::withdrawal(account_id, amount, time::now());
    let accounts = write_posting(uow, &posting).await?;
    single_movement(posting, accounts)
}

async fn post_deposit(
    uow: &mut dyn UnitOfWork,
    account_id: AccountId,
    amount: Amount,
) -> LedgerResult<Movement> {
    if uow.find_account(account_id).await?.is_none() {
        return Err(LedgerError::AccountNotFound(account_id));
    }

    let posting = Posting::deposit(account_id, amount, time::now());
    let accounts = write_posting(uow, &posting).await?;
    single_movement(posting, accounts)
}

async fn post_transfer(
    uow: &mut dyn UnitOfWork,
    locked: Vec<Account>,
    from: AccountId,
    to: AccountId,
    amount: Amount,
    description: Option<String>,
) -> LedgerResult<Transfer> {
    let source = take_locked(&locked, from)?;
    take_locked(&locked, to)?;
    source.ensure_funds(amount)?;

    let posting = Posting::transfer(from, to, amount, description.as_deref(), time::now())?;
    let mut accounts = write_posting(uow, &posting).await?.into_iter();
    let (Some(from_after), Some(to_after)) = (accounts.next(), accounts.next()) else {
        return Err(LedgerError::internal("transfer updated fewer than two accounts"));
    };

    Ok(Transfer {
        transaction: posting.transaction,
        entries: posting.entries,
        from: from_after,
        to: to_after,
    })
}
