//! Wallet and journal row models
//!
//! Row structs mirror the persisted schema; query/patch structs describe the
//! store operations. Action and status enums carry their database codes via
//! `id()`/`from_id()` so the numeric wire and column representations stay in
//! one place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Bounded retry count for the compare-and-set loop; exhaustion surfaces as
/// `UpdateWalletInterrupted`.
pub const R_MAX: u32 = 10;

// ============================================================================
// Action / Status codes
// ============================================================================

/// Audit classification of a journal row.
///
/// The engine never derives arithmetic from the action; the sign of the
/// transaction amount does that. The action is carried for querying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum TransactionAction {
    Deposit,
    Withdraw,
    Bonus,
    Interest,
    Open,
    Close,
    Manually,
}

impl TransactionAction {
    pub fn id(self) -> i16 {
        match self {
            TransactionAction::Deposit => 1,
            TransactionAction::Withdraw => 2,
            TransactionAction::Bonus => 3,
            TransactionAction::Interest => 4,
            TransactionAction::Open => 5,
            TransactionAction::Close => 6,
            TransactionAction::Manually => 7,
        }
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(TransactionAction::Deposit),
            2 => Some(TransactionAction::Withdraw),
            3 => Some(TransactionAction::Bonus),
            4 => Some(TransactionAction::Interest),
            5 => Some(TransactionAction::Open),
            6 => Some(TransactionAction::Close),
            7 => Some(TransactionAction::Manually),
            _ => None,
        }
    }
}

impl From<TransactionAction> for i16 {
    fn from(action: TransactionAction) -> i16 {
        action.id()
    }
}

impl TryFrom<i16> for TransactionAction {
    type Error = String;

    fn try_from(id: i16) -> Result<Self, Self::Error> {
        TransactionAction::from_id(id).ok_or_else(|| format!("unknown transaction action {}", id))
    }
}

/// Journal row state machine.
///
/// ```text
/// Pending ──▶ Success ──▶ Rollback
///    └──────▶ Failed
/// ```
///
/// Failed and Rollback are terminal. The store's guarded patch rejects every
/// transition not listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
    Rollback,
}

impl TransactionStatus {
    pub fn id(self) -> i16 {
        match self {
            TransactionStatus::Pending => 1,
            TransactionStatus::Success => 2,
            TransactionStatus::Failed => 3,
            TransactionStatus::Rollback => 4,
        }
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(TransactionStatus::Pending),
            2 => Some(TransactionStatus::Success),
            3 => Some(TransactionStatus::Failed),
            4 => Some(TransactionStatus::Rollback),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionStatus::Failed | TransactionStatus::Rollback)
    }

    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::Success)
                | (TransactionStatus::Pending, TransactionStatus::Failed)
                | (TransactionStatus::Success, TransactionStatus::Rollback)
        )
    }
}

impl From<TransactionStatus> for i16 {
    fn from(status: TransactionStatus) -> i16 {
        status.id()
    }
}

impl TryFrom<i16> for TransactionStatus {
    type Error = String;

    fn try_from(id: i16) -> Result<Self, Self::Error> {
        TransactionStatus::from_id(id).ok_or_else(|| format!("unknown transaction status {}", id))
    }
}

// ============================================================================
// Rows
// ============================================================================

/// A live wallet row. `amount >= 0` at every committed state.
#[derive(Debug, Clone, PartialEq)]
pub struct Wallet {
    pub id: u64,
    pub member_id: u64,
    pub currency: String,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A journal row. Snapshot fields are optional by design: a Failed row never
/// carries before/after, a Success row never carries rollback fields.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub id: u64,
    pub member_id: u64,
    pub wallet_id: u64,
    pub action: TransactionAction,
    pub amount: Money,
    pub before_amount: Option<Money>,
    pub after_amount: Option<Money>,
    pub currency: String,
    pub committer_id: u64,
    pub status: TransactionStatus,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub rollback_before_amount: Option<Money>,
    pub rollback_after_amount: Option<Money>,
    pub rollbacker_id: Option<u64>,
}

/// Fields for a journal append. Rows always enter in Pending.
#[derive(Debug, Clone)]
pub struct NewTransactionRecord {
    pub member_id: u64,
    pub wallet_id: u64,
    pub action: TransactionAction,
    pub amount: Money,
    pub currency: String,
    pub committer_id: u64,
    pub remark: Option<String>,
}

// ============================================================================
// Queries and patches
// ============================================================================

/// Wallet read predicate; empty vectors / None mean "unconstrained".
#[derive(Debug, Clone, Default)]
pub struct WalletQuery {
    pub ids: Vec<u64>,
    pub member_ids: Vec<u64>,
    pub currency: Option<String>,
    pub amount: Option<Money>,
}

impl WalletQuery {
    pub fn by_id(id: u64) -> Self {
        Self {
            ids: vec![id],
            ..Self::default()
        }
    }

    pub fn by_member(member_id: u64) -> Self {
        Self {
            member_ids: vec![member_id],
            ..Self::default()
        }
    }
}

/// Sortable journal columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderColumn {
    MemberId,
    CommitterId,
    Currency,
    CreatedAt,
}

impl OrderColumn {
    pub fn as_sql(self) -> &'static str {
        match self {
            OrderColumn::MemberId => "member_id",
            OrderColumn::CommitterId => "committer_id",
            OrderColumn::Currency => "currency",
            OrderColumn::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOrder {
    pub column: OrderColumn,
    pub direction: OrderDirection,
}

/// Journal list filter; all members optional, combined with AND.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub id: Option<u64>,
    pub member_id: Option<u64>,
    pub committer_id: Option<u64>,
    pub rollbacker_id: Option<u64>,
    pub currency: Vec<String>,
    pub action: Vec<TransactionAction>,
    pub status: Vec<TransactionStatus>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub order_by: Vec<RecordOrder>,
}

/// Partial update of a journal row. `None` leaves a column untouched; the
/// guarded patch only ever runs against an expected current status.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub before_amount: Option<Money>,
    pub after_amount: Option<Money>,
    pub status: Option<TransactionStatus>,
    pub remark: Option<String>,
    pub rollback_before_amount: Option<Money>,
    pub rollback_after_amount: Option<Money>,
    pub rollbacker_id: Option<u64>,
}

impl RecordPatch {
    /// Success stamp with balance snapshots.
    pub fn success(before: Money, after: Money) -> Self {
        Self {
            before_amount: Some(before),
            after_amount: Some(after),
            status: Some(TransactionStatus::Success),
            ..Self::default()
        }
    }

    /// Terminal failure stamp; snapshots stay empty.
    pub fn failed() -> Self {
        Self {
            status: Some(TransactionStatus::Failed),
            ..Self::default()
        }
    }

    /// Rollback stamp with compensating snapshots.
    pub fn rollback(
        before: Money,
        after: Money,
        rollbacker_id: u64,
        remark: Option<String>,
    ) -> Self {
        Self {
            status: Some(TransactionStatus::Rollback),
            rollback_before_amount: Some(before),
            rollback_after_amount: Some(after),
            rollbacker_id: Some(rollbacker_id),
            remark,
            ..Self::default()
        }
    }
}

// ============================================================================
// Pagination
// ============================================================================

/// Caller-supplied page. `page` is 1-based; a zero page is treated as 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    pub fn offset(&self) -> u64 {
        let page = self.page.max(1) as u64;
        (page - 1) * self.page_size as u64
    }

    pub fn limit(&self) -> u64 {
        self.page_size as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u32,
}

impl PageInfo {
    pub fn new(request: &PageRequest, total_count: u64) -> Self {
        let page_size = request.page_size.max(1) as u64;
        let total_pages = total_count.div_ceil(page_size) as u32;
        Self {
            page: request.page.max(1),
            page_size: request.page_size,
            total_count,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_codes_roundtrip() {
        for id in 1..=7i16 {
            let action = TransactionAction::from_id(id).unwrap();
            assert_eq!(action.id(), id);
        }
        assert!(TransactionAction::from_id(0).is_none());
        assert!(TransactionAction::from_id(8).is_none());
    }

    #[test]
    fn status_codes_roundtrip() {
        for id in 1..=4i16 {
            let status = TransactionStatus::from_id(id).unwrap();
            assert_eq!(status.id(), id);
        }
        assert!(TransactionStatus::from_id(5).is_none());
    }

    #[test]
    fn status_transitions() {
        use TransactionStatus::*;

        assert!(Pending.can_transition_to(Success));
        assert!(Pending.can_transition_to(Failed));
        assert!(Success.can_transition_to(Rollback));

        for from in [Failed, Rollback] {
            assert!(from.is_terminal());
            for to in [Pending, Success, Failed, Rollback] {
                assert!(!from.can_transition_to(to), "{:?} -> {:?}", from, to);
            }
        }
        assert!(!Success.can_transition_to(Pending));
        assert!(!Success.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Rollback));
    }

    #[test]
    fn action_serde_is_numeric() {
        let json = serde_json::to_string(&TransactionAction::Withdraw).unwrap();
        assert_eq!(json, "2");
        let back: TransactionAction = serde_json::from_str("7").unwrap();
        assert_eq!(back, TransactionAction::Manually);
        assert!(serde_json::from_str::<TransactionAction>("9").is_err());
    }

    #[test]
    fn page_math() {
        let request = PageRequest::new(3, 20);
        assert_eq!(request.offset(), 40);
        assert_eq!(request.limit(), 20);

        // zero page normalizes to the first page
        assert_eq!(PageRequest::new(0, 20).offset(), 0);

        let info = PageInfo::new(&PageRequest::new(1, 20), 41);
        assert_eq!(info.total_pages, 3);
        let empty = PageInfo::new(&PageRequest::new(1, 20), 0);
        assert_eq!(empty.total_pages, 0);
    }
}
