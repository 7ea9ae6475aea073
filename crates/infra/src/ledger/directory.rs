use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument};

use ledgerd_core::account::RECENT_ENTRY_LIMIT;
use ledgerd_core::{Account, AccountId, AccountWithEntries, LedgerError, LedgerResult, time};

use crate::store::LedgerStore;

/// Account creation and lookups.
///
/// Reads here never lock and see committed data only.
#[derive(Clone)]
pub struct AccountDirectory {
    store: Arc<dyn LedgerStore>,
}

impl AccountDirectory {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, initial_balance))]
    pub async fn create_account(
        &self,
        name: &str,
        initial_balance: Option<Decimal>,
    ) -> LedgerResult<Account> {
        let account = Account::open(name, initial_balance, time::now())?;
        let stored = self.store.insert_account(&account).await?;
        info!(account_id = %stored.id, balance = %stored.balance, "account created");
        Ok(stored)
    }

    pub async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        Ok(self.store.list_accounts().await?)
    }

    /// One account with its most recent entries, newest first.
    pub async fn get_account(&self, id: AccountId) -> LedgerResult<AccountWithEntries> {
        let account = self
            .store
            .find_account(id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))?;
        let entries = self.store.recent_entries(id, RECENT_ENTRY_LIMIT).await?;
        Ok(AccountWithEntries { account, entries })
    }

    pub async fn account_exists(&self, id: AccountId) -> LedgerResult<bool> {
        Ok(self.store.account_exists(id).await?)
    }
}
