//! Ledger services built on top of the storage boundary.

pub mod directory;
pub mod engine;

pub use directory::AccountDirectory;
pub use engine::{LedgerEngine, Movement, Transfer, UnitFuture};
