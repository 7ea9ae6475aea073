//! `ledgerd-core`: ledger domain building blocks.
//!
//! This crate contains **pure domain** types and rules (no infrastructure
//! concerns): identifiers, money amounts, accounts, journal records and the
//! construction of balanced postings.

pub mod account;
pub mod error;
pub mod id;
pub mod journal;
pub mod money;
pub mod posting;
pub mod time;

pub use account::{Account, AccountWithEntries};
pub use error::{LedgerError, LedgerResult};
pub use id::{AccountId, EntryId, TransactionId};
pub use journal::{Entry, EntryType, EntryWithTransaction, Transaction};
pub use money::Amount;
pub use posting::Posting;
