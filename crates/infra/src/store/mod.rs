//! Ledger storage boundary.
//!
//! The engine only talks to [`LedgerStore`] / [`UnitOfWork`]; adapters decide
//! how row locks and atomic commits are provided.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use r#trait::{LedgerStore, StoreError, UnitOfWork};
