//! Wallet ledger core
//!
//! Per-member currency balances plus the durable journal of every balance
//! change. The balance engine is the only writer of wallet amounts; the
//! stores are the only SQL.

pub mod engine;
pub mod error;
pub mod models;
pub mod pg;
pub mod store;

pub use engine::{ApplyOutcome, ApplyRequest, BalanceEngine, RollbackRequest};
pub use error::LedgerError;
pub use models::{
    NewTransactionRecord, OrderColumn, OrderDirection, PageInfo, PageRequest, R_MAX, RecordFilter,
    RecordOrder, RecordPatch, TransactionAction, TransactionRecord, TransactionStatus, Wallet,
    WalletQuery,
};
pub use pg::PgLedger;
pub use store::{CasOutcome, LedgerStore, LedgerTx};
