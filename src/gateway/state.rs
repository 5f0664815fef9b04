use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::db::Database;
use crate::ledger::{BalanceEngine, LedgerStore};

/// Shared gateway state
#[derive(Clone)]
pub struct AppState {
    /// Database handle (health checks)
    pub db: Arc<Database>,
    /// Ledger store (direct reads, wallet CRUD)
    pub store: Arc<dyn LedgerStore>,
    /// Balance engine (the only writer of wallet amounts)
    pub engine: BalanceEngine,
    /// Upper bound for caller-supplied page sizes
    pub max_page_size: u32,
    /// Cancelled on shutdown; observed by in-flight engine loops
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        db: Arc<Database>,
        store: Arc<dyn LedgerStore>,
        max_page_size: u32,
        shutdown: CancellationToken,
    ) -> Self {
        let engine = BalanceEngine::new(store.clone());
        Self {
            db,
            store,
            engine,
            max_page_size,
            shutdown,
        }
    }
}
