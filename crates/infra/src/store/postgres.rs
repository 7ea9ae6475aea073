//! Postgres-backed ledger store.
//!
//! ## Locking
//!
//! `lock_accounts` issues one `SELECT ... FOR UPDATE` per id, in the order the
//! caller passes them, inside the unit of work's transaction. Locks are held
//! until commit or rollback. Balance updates are single
//! `UPDATE ... SET balance = balance + $n` statements, so even an unlocked
//! writer (deposit) never loses a concurrent update.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (lock_not_available) | `55P03` | `LockTimeout` |
//! | Database (other) | Any other | `Backend` |
//! | RowNotFound | N/A | `RowNotFound` |
//! | Guarded UPDATE matched an existing row but no result | N/A | `BalanceOverflow` |
//! | Other | N/A | `Backend` |

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction as PgTransaction};
use tracing::instrument;

use ledgerd_core::{
    Account, AccountId, Amount, Entry, EntryId, EntryType, EntryWithTransaction, Transaction,
    TransactionId,
};

use super::r#trait::{LedgerStore, StoreError, UnitOfWork};

const SCHEMA: &str = include_str!("schema.sql");

const ACCOUNT_COLUMNS: &str = "id, name, balance, created_at, updated_at";

/// Postgres-backed ledger store.
///
/// `Clone` is cheap: the pool is reference counted. Safe to share across
/// tasks.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
    lock_timeout: Option<Duration>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: None,
        }
    }

    /// Connect a pool of at most `max_connections` connections.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Bound every row-lock wait (`SET LOCAL lock_timeout`).
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        if let Some(limit) = self.lock_timeout {
            // SET does not accept bind parameters; the value is an integer.
            let stmt = format!("SET LOCAL lock_timeout = '{}ms'", limit.as_millis());
            sqlx::query(&stmt)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("set_lock_timeout", e))?;
        }

        Ok(Box::new(PgUnitOfWork { tx }))
    }

    #[instrument(skip(self, account), fields(account_id = %account.id), err)]
    async fn insert_account(&self, account: &Account) -> Result<Account, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO accounts ({ACCOUNT_COLUMNS}) VALUES ($1, $2, $3, $4, $5) RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(account.id.as_uuid())
        .bind(&account.name)
        .bind(account.balance)
        .bind(account.created_at)
        .bind(account.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_account", e))?;

        decode_account(&row)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_accounts", e))?;

        rows.iter().map(decode_account).collect()
    }

    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_account", e))?;

        row.as_ref().map(decode_account).transpose()
    }

    async fn recent_entries(
        &self,
        id: AccountId,
        limit: usize,
    ) -> Result<Vec<EntryWithTransaction>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                e.id,
                e.amount,
                e.entry_type,
                e.account_id,
                e.transaction_id,
                e.created_at,
                t.description AS transaction_description,
                t.created_at AS transaction_created_at
            FROM entries e
            JOIN transactions t ON t.id = e.transaction_id
            WHERE e.account_id = $1
            ORDER BY e.created_at DESC, e.id DESC
            LIMIT $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("recent_entries", e))?;

        rows.iter()
            .map(|row| {
                let entry = EntryRow::from_row(row)
                    .map_err(|e| map_sqlx_error("decode_entry", e))?
                    .try_into_entry()?;
                let transaction = Transaction {
                    id: entry.transaction_id,
                    description: row
                        .try_get("transaction_description")
                        .map_err(|e| map_sqlx_error("decode_transaction", e))?,
                    created_at: row
                        .try_get("transaction_created_at")
                        .map_err(|e| map_sqlx_error("decode_transaction", e))?,
                };
                Ok(EntryWithTransaction { entry, transaction })
            })
            .collect()
    }

    async fn account_exists(&self, id: AccountId) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM accounts WHERE id = $1) AS found")
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("account_exists", e))?;

        row.try_get("found")
            .map_err(|e| map_sqlx_error("account_exists", e))
    }
}

/// One Postgres transaction.
///
/// Dropping the sqlx transaction without committing rolls it back.
struct PgUnitOfWork {
    tx: PgTransaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_accounts(&mut self, ids: &[AccountId]) -> Result<Vec<Account>, StoreError> {
        let stmt = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 FOR UPDATE");
        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            let row = sqlx::query(&stmt)
                .bind(id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("lock_account", e))?;
            if let Some(row) = row {
                rows.push(decode_account(&row)?);
            }
        }
        Ok(rows)
    }

    async fn find_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_account", e))?;

        row.as_ref().map(decode_account).transpose()
    }

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO transactions (id, description, created_at) VALUES ($1, $2, $3)")
            .bind(transaction.id.as_uuid())
            .bind(&transaction.description)
            .bind(transaction.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_transaction", e))?;
        Ok(())
    }

    async fn insert_entries(&mut self, entries: &[Entry]) -> Result<(), StoreError> {
        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO entries (id, amount, entry_type, account_id, transaction_id, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(entry.id.as_uuid())
            .bind(entry.amount.value())
            .bind(entry.entry_type.as_str())
            .bind(entry.account_id.as_uuid())
            .bind(entry.transaction_id.as_uuid())
            .bind(entry.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_entry", e))?;
        }
        Ok(())
    }

    async fn adjust_balance(
        &mut self,
        id: AccountId,
        delta: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Account, StoreError> {
        // NUMERIC is unbounded; refuse results the decimal type cannot hold.
        let row = sqlx::query(&format!(
            "UPDATE accounts SET balance = balance + $2, updated_at = $3 \
             WHERE id = $1 AND balance + $2 BETWEEN $4 AND $5 \
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(delta)
        .bind(at)
        .bind(Decimal::MIN)
        .bind(Decimal::MAX)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("adjust_balance", e))?;

        if let Some(row) = row {
            return decode_account(&row);
        }
        match self.find_account(id).await? {
            Some(_) => Err(StoreError::BalanceOverflow(format!("account {id}"))),
            None => Err(StoreError::RowNotFound(format!("account {id}"))),
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("55P03") => StoreError::LockTimeout(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::RowNotFound => {
            StoreError::RowNotFound(format!("unexpected row not found in {}", operation))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

// SQLx row types

#[derive(Debug)]
struct AccountRow {
    id: uuid::Uuid,
    name: String,
    balance: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for AccountRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(AccountRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            balance: row.try_get("balance")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: AccountId::from_uuid(row.id),
            name: row.name,
            balance: row.balance.normalize(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn decode_account(row: &PgRow) -> Result<Account, StoreError> {
    AccountRow::from_row(row)
        .map(Account::from)
        .map_err(|e| map_sqlx_error("decode_account", e))
}

#[derive(Debug)]
struct EntryRow {
    id: uuid::Uuid,
    amount: Decimal,
    entry_type: String,
    account_id: uuid::Uuid,
    transaction_id: uuid::Uuid,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for EntryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(EntryRow {
            id: row.try_get("id")?,
            amount: row.try_get("amount")?,
            entry_type: row.try_get("entry_type")?,
            account_id: row.try_get("account_id")?,
            transaction_id: row.try_get("transaction_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl EntryRow {
    fn try_into_entry(self) -> Result<Entry, StoreError> {
        let amount = Amount::new(self.amount)
            .map_err(|e| StoreError::Backend(format!("corrupt entry {}: {e}", self.id)))?;
        let entry_type: EntryType = self
            .entry_type
            .parse()
            .map_err(|e| StoreError::Backend(format!("corrupt entry {}: {e}", self.id)))?;

        Ok(Entry {
            id: EntryId::from_uuid(self.id),
            amount,
            entry_type,
            account_id: AccountId::from_uuid(self.account_id),
            transaction_id: TransactionId::from_uuid(self.transaction_id),
            created_at: self.created_at,
        })
    }
}
