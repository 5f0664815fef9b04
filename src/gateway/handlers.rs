//! RPC method handlers
//!
//! Each handler performs shallow request validation, calls the engine (for
//! mutations) or the store (for reads), and shapes the reply envelope.
//! Ledger errors convert straight into [`RpcError`], so `?` is the only
//! error plumbing here.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, TimeZone, Utc};

use super::state::AppState;
use super::types::{
    CreateWalletData, CreateWalletRequest, GetTransactionRecordData, GetTransactionRecordsData,
    GetWalletsData, HealthData, PageInfoData, RecordQueryRequest, RollbackTransactionRequest,
    RpcError, RpcResult, TransactionData, TransactionRecordData, TransactionRequest, WalletData,
    reply,
};
use crate::ledger::{
    ApplyRequest, PageRequest, RecordFilter, RollbackRequest, TransactionAction,
    TransactionStatus, WalletQuery,
};

const DEFAULT_PAGE_SIZE: u32 = 50;

/// Liveness/readiness probe
///
/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> RpcResult<HealthData> {
    state
        .db
        .health_check()
        .await
        .map_err(|e| RpcError::unavailable(format!("database unreachable: {}", e)))?;
    reply(HealthData { status: "ok" })
}

/// Create a wallet with a zero balance
///
/// POST /api/v1/wallets
pub async fn create_wallet(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateWalletRequest>,
) -> RpcResult<CreateWalletData> {
    if request.currency.trim().is_empty() {
        return Err(RpcError::validation("currency must not be empty"));
    }

    let wallet_id = state
        .store
        .create_wallet(request.member_id, request.currency.trim())
        .await?;

    reply(CreateWalletData { wallet_id })
}

/// Look up wallets by id or by member (optionally narrowed by currency)
///
/// GET /api/v1/wallets?id=7
/// GET /api/v1/wallets?member_id=42&currency=USD
pub async fn get_wallets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> RpcResult<GetWalletsData> {
    let query = if let Some(raw) = params.get("id") {
        let id: u64 = raw
            .parse()
            .map_err(|_| RpcError::validation("invalid id parameter"))?;
        WalletQuery::by_id(id)
    } else if let Some(raw) = params.get("member_id") {
        let member_id: u64 = raw
            .parse()
            .map_err(|_| RpcError::validation("invalid member_id parameter"))?;
        let mut query = WalletQuery::by_member(member_id);
        query.currency = params.get("currency").cloned();
        query
    } else {
        return Err(RpcError::validation("either id or member_id is required"));
    };

    let (wallets, _) = state.store.wallets(&query, None).await?;

    reply(GetWalletsData {
        wallets: wallets.into_iter().map(WalletData::from).collect(),
    })
}

/// Soft-delete a wallet
///
/// DELETE /api/v1/wallets/{id}
pub async fn delete_wallet(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> RpcResult<()> {
    state.store.soft_delete_wallet(id).await?;
    reply(())
}

/// Apply a signed amount against a wallet
///
/// POST /api/v1/transactions
pub async fn submit_transaction(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TransactionRequest>,
) -> RpcResult<TransactionData> {
    let action = TransactionAction::from_id(request.action)
        .ok_or_else(|| RpcError::validation(format!("unknown action {}", request.action)))?;
    if request.currency.trim().is_empty() {
        return Err(RpcError::validation("currency must not be empty"));
    }

    let outcome = state
        .engine
        .apply(
            ApplyRequest {
                wallet_id: request.wallet_id,
                action,
                amount: request.amount,
                currency: request.currency,
                committer_id: request.committer_id,
                remark: request.remark,
            },
            &state.shutdown,
        )
        .await?;

    reply(TransactionData {
        id: outcome.record_id,
        before_amount: outcome.before_amount.to_string(),
        after_amount: outcome.after_amount.to_string(),
        currency: outcome.currency,
        status: outcome.status,
        created_at: outcome.created_at.timestamp(),
        updated_at: outcome.updated_at.timestamp(),
    })
}

/// Reverse a previously successful transaction
///
/// POST /api/v1/transactions/{id}/rollback
pub async fn rollback_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(request): Json<RollbackTransactionRequest>,
) -> RpcResult<()> {
    state
        .engine
        .rollback(
            RollbackRequest {
                record_id: id,
                rollbacker_id: request.rollbacker_id,
                remark: request.remark,
            },
            &state.shutdown,
        )
        .await?;

    reply(())
}

/// Load a single journal row; an unknown id yields an empty payload, not an
/// error
///
/// GET /api/v1/transactions/{id}
pub async fn get_transaction_record(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> RpcResult<GetTransactionRecordData> {
    let record = state.store.record(id).await?;

    reply(GetTransactionRecordData {
        record: record.map(TransactionRecordData::from),
    })
}

/// Filtered, ordered, paginated journal listing
///
/// POST /api/v1/transactions/query
pub async fn query_transaction_records(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RecordQueryRequest>,
) -> RpcResult<GetTransactionRecordsData> {
    let mut action = Vec::with_capacity(request.action.len());
    for id in &request.action {
        action.push(
            TransactionAction::from_id(*id)
                .ok_or_else(|| RpcError::validation(format!("unknown action {}", id)))?,
        );
    }
    let mut status = Vec::with_capacity(request.status.len());
    for id in &request.status {
        status.push(
            TransactionStatus::from_id(*id)
                .ok_or_else(|| RpcError::validation(format!("unknown status {}", id)))?,
        );
    }

    let filter = RecordFilter {
        id: None,
        member_id: request.member_id,
        committer_id: request.committer_id,
        rollbacker_id: request.rollbacker_id,
        currency: request.currency,
        action,
        status,
        created_from: parse_unix_seconds(request.created_from, "created_from")?,
        created_to: parse_unix_seconds(request.created_to, "created_to")?,
        order_by: request.order,
    };

    let page = PageRequest::new(
        request.page.unwrap_or(1).max(1),
        request
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, state.max_page_size),
    );

    let (records, page_info) = state.store.records(&filter, &page).await?;

    reply(GetTransactionRecordsData {
        records: records
            .into_iter()
            .map(TransactionRecordData::from)
            .collect(),
        page_info: PageInfoData::from(page_info),
    })
}

fn parse_unix_seconds(
    value: Option<i64>,
    field: &str,
) -> Result<Option<DateTime<Utc>>, RpcError> {
    value
        .map(|secs| {
            Utc.timestamp_opt(secs, 0)
                .single()
                .ok_or_else(|| RpcError::validation(format!("invalid {} timestamp", field)))
        })
        .transpose()
}
