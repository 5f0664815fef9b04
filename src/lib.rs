//! Wallet Ledger Service
//!
//! Per-member currency balances with a durable, auditable journal of every
//! balance change. Mutations go through the balance engine's dual-row
//! protocol: a Pending journal row, a compare-and-set retry loop against the
//! wallet row, and a terminal Success/Failed/Rollback stamp.
//!
//! # Modules
//!
//! - [`money`] - Exact signed decimal value type
//! - [`ledger`] - Models, stores, and the balance engine
//! - [`gateway`] - HTTP RPC surface
//! - [`config`] - YAML configuration with env overrides
//! - [`db`] - PostgreSQL pool management
//! - [`logging`] - Tracing subscriber wiring

pub mod config;
pub mod db;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod money;

// Convenient re-exports at crate root
pub use config::AppConfig;
pub use db::Database;
pub use ledger::{
    ApplyOutcome, ApplyRequest, BalanceEngine, CasOutcome, LedgerError, LedgerStore, LedgerTx,
    PgLedger, RollbackRequest,
};
pub use money::{Money, MoneyError};
