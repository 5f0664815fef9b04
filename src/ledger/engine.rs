//! Balance engine
//!
//! The pair of operations that move money: apply and rollback. Both follow
//! the dual-row protocol that keeps a wallet row and its journal row mutually
//! consistent under concurrent writers:
//!
//! 1. the attempt is journaled in Pending before any transaction opens, so
//!    every attempt is recorded even if the process dies mid-flight;
//! 2. the wallet moves only through the amount compare-and-set, retried up to
//!    [`R_MAX`] times; the CAS column is the sole inter-writer synchronizer;
//! 3. the Success stamp commits atomically with the wallet update;
//! 4. the Failed stamp is written on a session distinct from the aborted
//!    transaction so the audit trail survives the rollback.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::error::LedgerError;
use super::models::{
    NewTransactionRecord, R_MAX, RecordPatch, TransactionAction, TransactionStatus, WalletQuery,
};
use super::store::{CasOutcome, LedgerStore, LedgerTx};
use crate::money::Money;

/// A balance mutation request. `amount` is the raw client string; its sign
/// drives the arithmetic, the action only classifies the row for audit.
#[derive(Debug, Clone)]
pub struct ApplyRequest {
    pub wallet_id: u64,
    pub action: TransactionAction,
    pub amount: String,
    pub currency: String,
    pub committer_id: u64,
    pub remark: Option<String>,
}

/// Snapshot returned by a successful apply.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub record_id: u64,
    pub before_amount: Money,
    pub after_amount: Money,
    pub currency: String,
    pub status: TransactionStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A compensation request for a previously successful apply.
#[derive(Debug, Clone)]
pub struct RollbackRequest {
    pub record_id: u64,
    pub rollbacker_id: u64,
    pub remark: Option<String>,
}

#[derive(Clone)]
pub struct BalanceEngine {
    store: Arc<dyn LedgerStore>,
}

impl BalanceEngine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Apply a signed amount to a wallet.
    ///
    /// The journal row is appended in Pending before the transaction opens;
    /// it ends in Success (committed with the wallet update) or Failed
    /// (stamped outside the aborted transaction). The `cancel` token is
    /// observed between attempts.
    pub async fn apply(
        &self,
        request: ApplyRequest,
        cancel: &CancellationToken,
    ) -> Result<ApplyOutcome, LedgerError> {
        let amount = Money::parse(&request.amount)?;

        let wallet = self
            .store
            .wallet(&WalletQuery::by_id(request.wallet_id))
            .await?
            .ok_or(LedgerError::NoSuchWallet)?;

        let record_id = self
            .store
            .append_record(&NewTransactionRecord {
                member_id: wallet.member_id,
                wallet_id: wallet.id,
                action: request.action,
                amount,
                currency: request.currency.clone(),
                committer_id: request.committer_id,
                remark: request.remark.clone(),
            })
            .await?;

        tracing::info!(
            record_id,
            wallet_id = request.wallet_id,
            action = request.action.id(),
            amount = %amount,
            committer_id = request.committer_id,
            "transaction journaled"
        );

        if wallet.currency != request.currency {
            let err = LedgerError::CurrencyMismatch {
                wallet: wallet.currency,
                requested: request.currency,
            };
            self.stamp_failed(record_id).await;
            return Err(err);
        }

        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                self.stamp_failed(record_id).await;
                return Err(e);
            }
        };

        let mut attempts = 0u32;
        let (before_amount, after_amount) = loop {
            if cancel.is_cancelled() {
                return Err(self.abort_apply(tx, record_id, LedgerError::Cancelled).await);
            }
            if attempts >= R_MAX {
                return Err(self
                    .abort_apply(tx, record_id, LedgerError::UpdateWalletInterrupted)
                    .await);
            }
            attempts += 1;

            let current = match tx.wallet_by_id(request.wallet_id).await {
                Ok(Some(wallet)) => wallet,
                Ok(None) => {
                    return Err(self.abort_apply(tx, record_id, LedgerError::NoSuchWallet).await);
                }
                Err(e) => return Err(self.abort_apply(tx, record_id, e).await),
            };

            let Some(after) = current.amount.checked_add(amount) else {
                return Err(self
                    .abort_apply(tx, record_id, LedgerError::AmountOutOfRange)
                    .await);
            };

            // A provably doomed attempt: the balance cannot go negative, and
            // retrying would not change the arithmetic within this attempt.
            if after.is_negative() {
                return Err(self
                    .abort_apply(tx, record_id, LedgerError::InsufficientBalance)
                    .await);
            }

            match tx.modify_wallet_amount(&current, after).await {
                Ok(CasOutcome::Updated) => break (current.amount, after),
                Ok(CasOutcome::Conflict) => {
                    tracing::debug!(
                        record_id,
                        wallet_id = request.wallet_id,
                        attempts,
                        "wallet moved under us, retrying"
                    );
                    continue;
                }
                Err(e) => return Err(self.abort_apply(tx, record_id, e).await),
            }
        };

        if let Err(e) = tx
            .mark_record(
                record_id,
                TransactionStatus::Pending,
                RecordPatch::success(before_amount, after_amount),
            )
            .await
        {
            return Err(self.abort_apply(tx, record_id, e).await);
        }

        if let Err(e) = tx.commit().await {
            tracing::error!(record_id, error = %e, "failed to commit transaction");
            self.stamp_failed(record_id).await;
            return Err(e);
        }

        // Re-read for authoritative timestamps.
        let record = self
            .store
            .record(record_id)
            .await?
            .ok_or(LedgerError::NoSuchTransactionRecord)?;

        Ok(ApplyOutcome {
            record_id,
            before_amount,
            after_amount,
            currency: record.currency,
            status: record.status,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    /// Reverse a previously successful apply by applying the negated amount.
    ///
    /// The compensating delta is exempt from the non-negativity check: the
    /// original effect is already committed, so the reversal must go through
    /// even when it drives the balance below zero. Loop exhaustion leaves the
    /// record in Success so the rollback can be retried.
    pub async fn rollback(
        &self,
        request: RollbackRequest,
        cancel: &CancellationToken,
    ) -> Result<(), LedgerError> {
        let record = self
            .store
            .record(request.record_id)
            .await?
            .ok_or(LedgerError::NoSuchTransactionRecord)?;

        if record.status != TransactionStatus::Success {
            return Err(LedgerError::TransactionNotSuccess);
        }

        let delta = -record.amount;
        let mut tx = self.store.begin().await?;

        let mut attempts = 0u32;
        let (before_amount, after_amount) = loop {
            if cancel.is_cancelled() {
                return Err(self.abort_rollback(tx, record.id, LedgerError::Cancelled).await);
            }
            if attempts >= R_MAX {
                return Err(self
                    .abort_rollback(tx, record.id, LedgerError::UpdateWalletInterrupted)
                    .await);
            }
            attempts += 1;

            let current = match tx.wallet_by_id(record.wallet_id).await {
                Ok(Some(wallet)) => wallet,
                Ok(None) => {
                    return Err(self
                        .abort_rollback(tx, record.id, LedgerError::NoSuchWallet)
                        .await);
                }
                Err(e) => return Err(self.abort_rollback(tx, record.id, e).await),
            };

            let Some(after) = current.amount.checked_add(delta) else {
                return Err(self
                    .abort_rollback(tx, record.id, LedgerError::AmountOutOfRange)
                    .await);
            };

            match tx.modify_wallet_amount(&current, after).await {
                Ok(CasOutcome::Updated) => break (current.amount, after),
                Ok(CasOutcome::Conflict) => {
                    tracing::debug!(
                        record_id = record.id,
                        wallet_id = record.wallet_id,
                        attempts,
                        "wallet moved under us, retrying"
                    );
                    continue;
                }
                Err(e) => return Err(self.abort_rollback(tx, record.id, e).await),
            }
        };

        if let Err(e) = tx
            .mark_record(
                record.id,
                TransactionStatus::Success,
                RecordPatch::rollback(
                    before_amount,
                    after_amount,
                    request.rollbacker_id,
                    request.remark,
                ),
            )
            .await
        {
            return Err(self.abort_rollback(tx, record.id, e).await);
        }

        tx.commit().await?;

        tracing::info!(
            record_id = record.id,
            wallet_id = record.wallet_id,
            rollbacker_id = request.rollbacker_id,
            rollback_before = %before_amount,
            rollback_after = %after_amount,
            "transaction rolled back"
        );

        Ok(())
    }

    /// Abort the apply path: roll back the transaction, stamp the journal row
    /// Failed on a fresh session, and hand the original error back.
    async fn abort_apply(
        &self,
        tx: Box<dyn LedgerTx>,
        record_id: u64,
        err: LedgerError,
    ) -> LedgerError {
        if let Err(e) = tx.rollback().await {
            tracing::warn!(record_id, error = %e, "failed to roll back transaction");
        }
        self.log_abort(record_id, &err);
        self.stamp_failed(record_id).await;
        err
    }

    /// Abort the rollback path. The journal row stays in Success: the
    /// original effect is still committed and the rollback may be retried.
    async fn abort_rollback(
        &self,
        tx: Box<dyn LedgerTx>,
        record_id: u64,
        err: LedgerError,
    ) -> LedgerError {
        if let Err(e) = tx.rollback().await {
            tracing::warn!(record_id, error = %e, "failed to roll back transaction");
        }
        self.log_abort(record_id, &err);
        err
    }

    fn log_abort(&self, record_id: u64, err: &LedgerError) {
        if err.is_storage_or_contention() {
            tracing::error!(record_id, error = %err, "balance mutation failed");
        } else {
            tracing::debug!(record_id, error = %err, "balance mutation rejected");
        }
    }

    /// Best-effort terminal stamp; a failure here is logged but never masks
    /// the original error returned to the caller.
    async fn stamp_failed(&self, record_id: u64) {
        if let Err(e) = self
            .store
            .mark_record(record_id, TransactionStatus::Pending, RecordPatch::failed())
            .await
        {
            tracing::warn!(record_id, error = %e, "failed to stamp journal row as failed");
        }
    }
}
