//! Infrastructure layer: storage adapters and the transactional ledger
//! services built on top of them.

pub mod ledger;
pub mod store;


pub use ledger::{AccountDirectory, LedgerEngine, Movement, Transfer, UnitFuture};
pub use store::{InMemoryLedgerStore, LedgerStore, PostgresLedgerStore, StoreError, UnitOfWork};
