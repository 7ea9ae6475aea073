use std::sync::Arc;

use ledgerd_infra::{AccountDirectory, InMemoryLedgerStore, LedgerEngine, LedgerStore};

/// Shared services handed to every handler.
///
/// The engine and the directory share one store, so every request goes
/// through the same row locks.
#[derive(Clone)]
pub struct AppServices {
    pub engine: LedgerEngine,
    pub directory: AccountDirectory,
}

impl AppServices {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            engine: LedgerEngine::new(store.clone()),
            directory: AccountDirectory::new(store),
        }
    }

    /// Services backed by a fresh in-memory store (tests, local runs).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryLedgerStore::new()))
    }
}
