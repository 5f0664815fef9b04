//! RPC surface types
//!
//! Every reply carries a machine-readable wallet reply code next to the
//! payload, so calling services can branch without parsing HTTP statuses or
//! error prose. Failures travel as [`RpcError`], which knows the status,
//! code, and message for each ledger error kind.
//!
//! Money crosses the wire as canonical strings, ids as unsigned 64-bit
//! integers, timestamps as Unix seconds. Optional journal fields are omitted
//! when absent rather than sent as sentinel zeros.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};

use crate::ledger::{
    LedgerError, PageInfo, RecordOrder, TransactionRecord, TransactionStatus, Wallet,
};

// ============================================================================
// Reply envelope
// ============================================================================

/// Wire envelope for every RPC reply.
///
/// Exactly one of `result`/`error` is present: `result` when `code` is
/// [`codes::OK`], `error` otherwise.
#[derive(Debug, Serialize)]
pub struct RpcReply<T> {
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> RpcReply<T> {
    pub fn done(result: T) -> Self {
        Self {
            code: codes::OK,
            result: Some(result),
            error: None,
        }
    }
}

impl RpcReply<()> {
    pub fn failed(code: u16, error: impl Into<String>) -> Self {
        Self {
            code,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Handler return type: a successful envelope or an [`RpcError`].
pub type RpcResult<T> = Result<Json<RpcReply<T>>, RpcError>;

/// Wrap a payload in a success envelope.
pub fn reply<T: Serialize>(result: T) -> RpcResult<T> {
    Ok(Json(RpcReply::done(result)))
}

// ============================================================================
// RpcError
// ============================================================================

/// A failed RPC call, before it is shaped into the wire envelope.
#[derive(Debug)]
pub enum RpcError {
    /// Shallow request validation failed before reaching the engine.
    Validation(String),
    /// The engine or a store refused or failed the call.
    Ledger(LedgerError),
    /// A dependency is down or the service is draining.
    Unavailable(String),
}

impl RpcError {
    pub fn validation(message: impl Into<String>) -> Self {
        RpcError::Validation(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        RpcError::Unavailable(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RpcError::Validation(_) => StatusCode::BAD_REQUEST,
            RpcError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RpcError::Ledger(err) => match err {
                LedgerError::NoSuchWallet | LedgerError::NoSuchTransactionRecord => {
                    StatusCode::NOT_FOUND
                }
                LedgerError::TransactionNotSuccess
                | LedgerError::UpdateWalletInterrupted
                | LedgerError::RecordStatusConflict { .. } => StatusCode::CONFLICT,
                LedgerError::InsufficientBalance
                | LedgerError::CurrencyMismatch { .. }
                | LedgerError::InvalidAmount(_)
                | LedgerError::AmountOutOfRange
                | LedgerError::UnknownAction(_) => StatusCode::BAD_REQUEST,
                LedgerError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                LedgerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            RpcError::Validation(_) => codes::INVALID_REQUEST,
            RpcError::Unavailable(_) => codes::UNAVAILABLE,
            RpcError::Ledger(err) => match err {
                LedgerError::NoSuchWallet => codes::NO_SUCH_WALLET,
                LedgerError::NoSuchTransactionRecord => codes::NO_SUCH_RECORD,
                LedgerError::TransactionNotSuccess => codes::NOT_ROLLBACKABLE,
                LedgerError::InsufficientBalance => codes::INSUFFICIENT_BALANCE,
                LedgerError::UpdateWalletInterrupted
                | LedgerError::RecordStatusConflict { .. } => codes::WALLET_CONTENDED,
                LedgerError::CurrencyMismatch { .. } => codes::CURRENCY_MISMATCH,
                LedgerError::InvalidAmount(_) | LedgerError::AmountOutOfRange => {
                    codes::INVALID_AMOUNT
                }
                LedgerError::UnknownAction(_) => codes::INVALID_REQUEST,
                LedgerError::Cancelled => codes::UNAVAILABLE,
                LedgerError::Database(_) => codes::STORAGE_FAILURE,
            },
        }
    }

    fn message(&self) -> String {
        match self {
            RpcError::Validation(message) | RpcError::Unavailable(message) => message.clone(),
            RpcError::Ledger(err) => err.to_string(),
        }
    }
}

impl From<LedgerError> for RpcError {
    fn from(err: LedgerError) -> Self {
        RpcError::Ledger(err)
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> axum::response::Response {
        let body = Json(RpcReply::failed(self.code(), self.message()));
        (self.status(), body).into_response()
    }
}

/// Wallet reply codes, grouped by failure class: validation 1x, failed
/// preconditions 2x, missing resources 3x, contention 4x, server faults 5x.
pub mod codes {
    pub const OK: u16 = 0;

    pub const INVALID_REQUEST: u16 = 10;
    pub const INVALID_AMOUNT: u16 = 11;
    pub const CURRENCY_MISMATCH: u16 = 12;

    pub const INSUFFICIENT_BALANCE: u16 = 20;
    pub const NOT_ROLLBACKABLE: u16 = 21;

    pub const NO_SUCH_WALLET: u16 = 30;
    pub const NO_SUCH_RECORD: u16 = 31;

    pub const WALLET_CONTENDED: u16 = 40;

    pub const STORAGE_FAILURE: u16 = 50;
    pub const UNAVAILABLE: u16 = 51;
    pub const INTERNAL: u16 = 52;
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateWalletRequest {
    pub member_id: u64,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct CreateWalletData {
    pub wallet_id: u64,
}

#[derive(Debug, Serialize)]
pub struct WalletData {
    pub id: u64,
    pub member_id: u64,
    pub amount: String,
    pub currency: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Wallet> for WalletData {
    fn from(wallet: Wallet) -> Self {
        Self {
            id: wallet.id,
            member_id: wallet.member_id,
            amount: wallet.amount.to_string(),
            currency: wallet.currency,
            created_at: wallet.created_at.timestamp(),
            updated_at: wallet.updated_at.timestamp(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GetWalletsData {
    pub wallets: Vec<WalletData>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionRequest {
    pub wallet_id: u64,
    /// Numeric action code, see `TransactionAction`
    pub action: i16,
    /// Signed decimal string; negative values decrease the balance
    pub amount: String,
    pub currency: String,
    pub committer_id: u64,
    #[serde(default)]
    pub remark: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransactionData {
    pub id: u64,
    pub before_amount: String,
    pub after_amount: String,
    pub currency: String,
    pub status: TransactionStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct RollbackTransactionRequest {
    pub rollbacker_id: u64,
    #[serde(default)]
    pub remark: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransactionRecordData {
    pub id: u64,
    pub member_id: u64,
    pub wallet_id: u64,
    pub action: i16,
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_amount: Option<String>,
    pub currency: String,
    pub committer_id: u64,
    pub status: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_before_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_after_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollbacker_id: Option<u64>,
}

impl From<TransactionRecord> for TransactionRecordData {
    fn from(record: TransactionRecord) -> Self {
        Self {
            id: record.id,
            member_id: record.member_id,
            wallet_id: record.wallet_id,
            action: record.action.id(),
            amount: record.amount.to_string(),
            before_amount: record.before_amount.map(|v| v.to_string()),
            after_amount: record.after_amount.map(|v| v.to_string()),
            currency: record.currency,
            committer_id: record.committer_id,
            status: record.status.id(),
            remark: record.remark,
            created_at: record.created_at.timestamp(),
            updated_at: record.updated_at.timestamp(),
            rollback_before_amount: record.rollback_before_amount.map(|v| v.to_string()),
            rollback_after_amount: record.rollback_after_amount.map(|v| v.to_string()),
            rollbacker_id: record.rollbacker_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GetTransactionRecordData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<TransactionRecordData>,
}

/// Journal query: every filter optional, combined with AND.
#[derive(Debug, Default, Deserialize)]
pub struct RecordQueryRequest {
    #[serde(default)]
    pub member_id: Option<u64>,
    #[serde(default)]
    pub committer_id: Option<u64>,
    #[serde(default)]
    pub rollbacker_id: Option<u64>,
    #[serde(default)]
    pub currency: Vec<String>,
    /// Numeric action codes
    #[serde(default)]
    pub action: Vec<i16>,
    /// Numeric status codes
    #[serde(default)]
    pub status: Vec<i16>,
    /// Unix seconds, inclusive
    #[serde(default)]
    pub created_from: Option<i64>,
    /// Unix seconds, inclusive
    #[serde(default)]
    pub created_to: Option<i64>,
    #[serde(default)]
    pub order: Vec<RecordOrder>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct PageInfoData {
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u32,
}

impl From<PageInfo> for PageInfoData {
    fn from(info: PageInfo) -> Self {
        Self {
            page: info.page,
            page_size: info.page_size,
            total_count: info.total_count,
            total_pages: info.total_pages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GetTransactionRecordsData {
    pub records: Vec<TransactionRecordData>,
    pub page_info: PageInfoData,
}

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{OrderColumn, OrderDirection, TransactionAction};
    use crate::money::Money;
    use chrono::{TimeZone, Utc};

    fn sample_record() -> TransactionRecord {
        TransactionRecord {
            id: 9,
            member_id: 1,
            wallet_id: 2,
            action: TransactionAction::Deposit,
            amount: Money::parse("100.50").unwrap(),
            before_amount: None,
            after_amount: None,
            currency: "USD".into(),
            committer_id: 3,
            status: TransactionStatus::Failed,
            remark: None,
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 1).unwrap(),
            rollback_before_amount: None,
            rollback_after_amount: None,
            rollbacker_id: None,
        }
    }

    #[test]
    fn reply_envelope_shapes() {
        let done = serde_json::to_value(RpcReply::done(7u32)).unwrap();
        assert_eq!(done, serde_json::json!({"code": 0, "result": 7}));

        let failed = serde_json::to_value(RpcReply::failed(
            codes::NO_SUCH_WALLET,
            "no such wallet",
        ))
        .unwrap();
        assert_eq!(failed["code"], codes::NO_SUCH_WALLET);
        assert_eq!(failed["error"], "no such wallet");
        assert!(failed.get("result").is_none());
    }

    #[test]
    fn record_dto_omits_absent_snapshots() {
        let json = serde_json::to_value(TransactionRecordData::from(sample_record())).unwrap();
        assert_eq!(json["amount"], "100.50");
        assert_eq!(json["status"], 3);
        assert!(json.get("before_amount").is_none());
        assert!(json.get("rollbacker_id").is_none());
    }

    #[test]
    fn record_dto_keeps_present_snapshots() {
        let mut record = sample_record();
        record.status = TransactionStatus::Rollback;
        record.before_amount = Some(Money::parse("0").unwrap());
        record.after_amount = Some(Money::parse("100.50").unwrap());
        record.rollback_before_amount = Some(Money::parse("100.50").unwrap());
        record.rollback_after_amount = Some(Money::parse("0").unwrap());
        record.rollbacker_id = Some(77);

        let json = serde_json::to_value(TransactionRecordData::from(record)).unwrap();
        assert_eq!(json["before_amount"], "0");
        assert_eq!(json["rollback_before_amount"], "100.50");
        assert_eq!(json["rollback_after_amount"], "0");
        assert_eq!(json["rollbacker_id"], 77);
    }

    #[test]
    fn ledger_error_mapping() {
        let err = RpcError::from(LedgerError::NoSuchWallet);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), codes::NO_SUCH_WALLET);

        let err = RpcError::from(LedgerError::InsufficientBalance);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), codes::INSUFFICIENT_BALANCE);

        let err = RpcError::from(LedgerError::UpdateWalletInterrupted);
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), codes::WALLET_CONTENDED);

        let err = RpcError::from(LedgerError::TransactionNotSuccess);
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), codes::NOT_ROLLBACKABLE);

        let err = RpcError::from(LedgerError::Database(sqlx::Error::PoolClosed));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), codes::STORAGE_FAILURE);

        let err = RpcError::validation("bad input");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), codes::INVALID_REQUEST);
    }

    #[test]
    fn record_query_deserializes_orders() {
        let request: RecordQueryRequest = serde_json::from_str(
            r#"{
                "member_id": 5,
                "status": [2, 4],
                "order": [{"column": "created_at", "direction": "desc"}],
                "page": 2,
                "page_size": 25
            }"#,
        )
        .unwrap();

        assert_eq!(request.member_id, Some(5));
        assert_eq!(request.status, vec![2, 4]);
        assert_eq!(
            request.order,
            vec![RecordOrder {
                column: OrderColumn::CreatedAt,
                direction: OrderDirection::Desc,
            }]
        );
        assert!(serde_json::from_str::<RecordQueryRequest>(
            r#"{"order": [{"column": "amount", "direction": "desc"}]}"#
        )
        .is_err());
    }
}
