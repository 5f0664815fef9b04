//! Store traits: the session-provider seam between the balance engine and
//! the database.
//!
//! [`LedgerStore`] covers pool-scoped, auto-commit operations plus `begin()`;
//! [`LedgerTx`] is one open database transaction. The engine only ever talks
//! to these traits, which keeps the retry protocol testable against an
//! in-memory store and keeps the process free of hidden database singletons.

use async_trait::async_trait;

use super::error::LedgerError;
use super::models::{
    NewTransactionRecord, PageInfo, PageRequest, RecordFilter, RecordPatch, TransactionRecord,
    TransactionStatus, Wallet, WalletQuery,
};
use crate::money::Money;

/// Result of the conditional wallet update.
///
/// `Conflict` means the row exists but its stored amount no longer equals the
/// amount the caller observed; the caller re-reads and retries. A vanished
/// row is reported as `NoSuchWallet`, never as `Conflict`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Updated,
    Conflict,
}

/// Pool-scoped store operations.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert a wallet with a zero balance; returns the assigned id.
    async fn create_wallet(&self, member_id: u64, currency: &str) -> Result<u64, LedgerError>;

    /// Load the first wallet matching the predicate.
    async fn wallet(&self, query: &WalletQuery) -> Result<Option<Wallet>, LedgerError>;

    /// List wallets matching the predicate; with a page, also counts the
    /// total matching rows.
    async fn wallets(
        &self,
        query: &WalletQuery,
        page: Option<&PageRequest>,
    ) -> Result<(Vec<Wallet>, Option<PageInfo>), LedgerError>;

    /// Soft-delete a live wallet.
    async fn soft_delete_wallet(&self, id: u64) -> Result<(), LedgerError>;

    /// Append a journal row in Pending; returns the assigned id.
    async fn append_record(&self, record: &NewTransactionRecord) -> Result<u64, LedgerError>;

    /// Load a journal row by id.
    async fn record(&self, id: u64) -> Result<Option<TransactionRecord>, LedgerError>;

    /// Filtered, ordered, paginated journal listing with total count.
    async fn records(
        &self,
        filter: &RecordFilter,
        page: &PageRequest,
    ) -> Result<(Vec<TransactionRecord>, PageInfo), LedgerError>;

    /// Guarded patch of a journal row: applies only while the row is still in
    /// `expected`. A stale guard yields `RecordStatusConflict` so terminal
    /// rows cannot be overwritten.
    async fn mark_record(
        &self,
        id: u64,
        expected: TransactionStatus,
        patch: RecordPatch,
    ) -> Result<(), LedgerError>;

    /// Open a database transaction.
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, LedgerError>;
}

/// One open database transaction. Dropping it without `commit` rolls it back.
#[async_trait]
pub trait LedgerTx: Send {
    /// Read a live wallet by id inside the transaction.
    async fn wallet_by_id(&mut self, id: u64) -> Result<Option<Wallet>, LedgerError>;

    /// Compare-and-set the wallet amount: updates only while the stored
    /// amount still equals `wallet.amount`.
    async fn modify_wallet_amount(
        &mut self,
        wallet: &Wallet,
        new_amount: Money,
    ) -> Result<CasOutcome, LedgerError>;

    /// Guarded journal patch, same contract as [`LedgerStore::mark_record`],
    /// applied inside the transaction.
    async fn mark_record(
        &mut self,
        id: u64,
        expected: TransactionStatus,
        patch: RecordPatch,
    ) -> Result<(), LedgerError>;

    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError>;
}
