//! Ledger error types

use thiserror::Error;

use crate::money::MoneyError;

/// Errors surfaced by the stores and the balance engine.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("no such wallet")]
    NoSuchWallet,

    #[error("no such transaction record")]
    NoSuchTransactionRecord,

    #[error("transaction record is not in success status")]
    TransactionNotSuccess,

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("wallet update interrupted by concurrent writers")]
    UpdateWalletInterrupted,

    #[error("currency mismatch: wallet holds {wallet}, request carried {requested}")]
    CurrencyMismatch { wallet: String, requested: String },

    #[error(transparent)]
    InvalidAmount(#[from] MoneyError),

    #[error("amount out of representable range")]
    AmountOutOfRange,

    #[error("unknown transaction action {0}")]
    UnknownAction(i16),

    #[error("transaction record {id} changed status concurrently")]
    RecordStatusConflict { id: u64 },

    #[error("request cancelled")]
    Cancelled,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl LedgerError {
    /// Storage and contention failures are logged at error level at the
    /// engine boundary; precondition and validation failures are not.
    pub fn is_storage_or_contention(&self) -> bool {
        matches!(
            self,
            LedgerError::Database(_)
                | LedgerError::UpdateWalletInterrupted
                | LedgerError::RecordStatusConflict { .. }
                | LedgerError::AmountOutOfRange
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_classification() {
        assert!(LedgerError::UpdateWalletInterrupted.is_storage_or_contention());
        assert!(LedgerError::Database(sqlx::Error::PoolClosed).is_storage_or_contention());
        assert!(!LedgerError::InsufficientBalance.is_storage_or_contention());
        assert!(!LedgerError::NoSuchWallet.is_storage_or_contention());
        assert!(
            !LedgerError::CurrencyMismatch {
                wallet: "USD".into(),
                requested: "EUR".into(),
            }
            .is_storage_or_contention()
        );
    }
}
