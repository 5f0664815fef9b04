//! Transaction record (journal) table SQL
//!
//! Every patch of a journal row is guarded by `(id, current status)` so a
//! stale writer can never overwrite a terminal row.

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgExecutor, Postgres, QueryBuilder, Row};

use crate::ledger::error::LedgerError;
use crate::ledger::models::{
    NewTransactionRecord, PageInfo, PageRequest, RecordFilter, RecordOrder, RecordPatch,
    TransactionAction, TransactionRecord, TransactionStatus,
};

const SELECT_RECORD: &str = r#"
SELECT id, member_id, wallet_id, action, amount, before_amount, after_amount,
       currency, committer_id, status, remark, created_at, updated_at,
       rollback_before_amount, rollback_after_amount, rollbacker_id
FROM transaction_record
"#;

/// Append a journal row in Pending.
pub async fn append(
    exec: impl PgExecutor<'_>,
    record: &NewTransactionRecord,
) -> Result<u64, LedgerError> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO transaction_record
            (member_id, wallet_id, action, amount, currency, committer_id, status, remark)
        VALUES
            ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(record.member_id as i64)
    .bind(record.wallet_id as i64)
    .bind(record.action.id())
    .bind(record.amount)
    .bind(&record.currency)
    .bind(record.committer_id as i64)
    .bind(TransactionStatus::Pending.id())
    .bind(record.remark.as_deref())
    .fetch_one(exec)
    .await?;

    Ok(id as u64)
}

pub async fn fetch_by_id(
    exec: impl PgExecutor<'_>,
    id: u64,
) -> Result<Option<TransactionRecord>, LedgerError> {
    let mut qb = QueryBuilder::new(SELECT_RECORD);
    qb.push(" WHERE id = ").push_bind(id as i64);

    let row = qb.build().fetch_optional(exec).await?;
    Ok(row.map(|r| record_from_row(&r)).transpose()?)
}

/// Guarded partial update.
///
/// The row is patched only while it is still in `expected`; zero affected
/// rows distinguishes a vanished row from one whose status moved underneath
/// the caller. Illegal status transitions are rejected before touching the
/// database.
pub async fn mark(
    conn: &mut PgConnection,
    id: u64,
    expected: TransactionStatus,
    patch: &RecordPatch,
) -> Result<(), LedgerError> {
    if let Some(next) = patch.status {
        if !expected.can_transition_to(next) {
            return Err(LedgerError::RecordStatusConflict { id });
        }
    }

    let mut qb = QueryBuilder::new("UPDATE transaction_record SET updated_at = NOW()");
    if let Some(v) = patch.before_amount {
        qb.push(", before_amount = ").push_bind(v);
    }
    if let Some(v) = patch.after_amount {
        qb.push(", after_amount = ").push_bind(v);
    }
    if let Some(v) = patch.status {
        qb.push(", status = ").push_bind(v.id());
    }
    if let Some(v) = &patch.remark {
        qb.push(", remark = ").push_bind(v.clone());
    }
    if let Some(v) = patch.rollback_before_amount {
        qb.push(", rollback_before_amount = ").push_bind(v);
    }
    if let Some(v) = patch.rollback_after_amount {
        qb.push(", rollback_after_amount = ").push_bind(v);
    }
    if let Some(v) = patch.rollbacker_id {
        qb.push(", rollbacker_id = ").push_bind(v as i64);
    }
    qb.push(" WHERE id = ").push_bind(id as i64);
    qb.push(" AND status = ").push_bind(expected.id());

    let result = qb.build().execute(&mut *conn).await?;
    if result.rows_affected() > 0 {
        return Ok(());
    }

    let current =
        sqlx::query_scalar::<_, i16>("SELECT status FROM transaction_record WHERE id = $1")
            .bind(id as i64)
            .fetch_optional(&mut *conn)
            .await?;

    match current {
        Some(_) => Err(LedgerError::RecordStatusConflict { id }),
        None => Err(LedgerError::NoSuchTransactionRecord),
    }
}

/// Append the list filter; all conditions combine with AND.
pub fn push_filters(qb: &mut QueryBuilder<Postgres>, filter: &RecordFilter) {
    qb.push(" WHERE 1 = 1");

    if let Some(id) = filter.id {
        qb.push(" AND id = ").push_bind(id as i64);
    }
    if let Some(v) = filter.member_id {
        qb.push(" AND member_id = ").push_bind(v as i64);
    }
    if let Some(v) = filter.committer_id {
        qb.push(" AND committer_id = ").push_bind(v as i64);
    }
    if let Some(v) = filter.rollbacker_id {
        qb.push(" AND rollbacker_id = ").push_bind(v as i64);
    }
    if !filter.currency.is_empty() {
        qb.push(" AND currency = ANY(")
            .push_bind(filter.currency.clone())
            .push(")");
    }
    if !filter.action.is_empty() {
        let ids: Vec<i16> = filter.action.iter().map(|a| a.id()).collect();
        qb.push(" AND action = ANY(").push_bind(ids).push(")");
    }
    if !filter.status.is_empty() {
        let ids: Vec<i16> = filter.status.iter().map(|s| s.id()).collect();
        qb.push(" AND status = ANY(").push_bind(ids).push(")");
    }
    if let Some(v) = filter.created_from {
        qb.push(" AND created_at >= ").push_bind(v);
    }
    if let Some(v) = filter.created_to {
        qb.push(" AND created_at <= ").push_bind(v);
    }
}

/// Append the ORDER BY clause. Columns and directions come from a closed
/// enum, so raw pushes here cannot carry user input.
pub fn push_order(qb: &mut QueryBuilder<Postgres>, orders: &[RecordOrder]) {
    if orders.is_empty() {
        return;
    }
    qb.push(" ORDER BY ");
    let mut separated = qb.separated(", ");
    for order in orders {
        separated.push(format!(
            "{} {}",
            order.column.as_sql(),
            order.direction.as_sql()
        ));
    }
}

/// Filtered, ordered page of journal rows plus the total count over the same
/// filter.
pub async fn list(
    conn: &mut PgConnection,
    filter: &RecordFilter,
    page: &PageRequest,
) -> Result<(Vec<TransactionRecord>, PageInfo), LedgerError> {
    let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM transaction_record");
    push_filters(&mut count_qb, filter);
    let total: i64 = count_qb.build_query_scalar().fetch_one(&mut *conn).await?;
    let page_info = PageInfo::new(page, total as u64);

    let mut qb = QueryBuilder::new(SELECT_RECORD);
    push_filters(&mut qb, filter);
    push_order(&mut qb, &filter.order_by);
    qb.push(" OFFSET ").push_bind(page.offset() as i64);
    qb.push(" LIMIT ").push_bind(page.limit() as i64);

    let rows = qb.build().fetch_all(&mut *conn).await?;
    let mut records = Vec::with_capacity(rows.len());
    for row in &rows {
        records.push(record_from_row(row)?);
    }

    Ok((records, page_info))
}

fn record_from_row(row: &PgRow) -> Result<TransactionRecord, sqlx::Error> {
    let action_id: i16 = row.try_get("action")?;
    let action = TransactionAction::from_id(action_id).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: "action".into(),
        source: format!("unknown transaction action {}", action_id).into(),
    })?;

    let status_id: i16 = row.try_get("status")?;
    let status = TransactionStatus::from_id(status_id).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: "status".into(),
        source: format!("unknown transaction status {}", status_id).into(),
    })?;

    Ok(TransactionRecord {
        id: row.try_get::<i64, _>("id")? as u64,
        member_id: row.try_get::<i64, _>("member_id")? as u64,
        wallet_id: row.try_get::<i64, _>("wallet_id")? as u64,
        action,
        amount: row.try_get("amount")?,
        before_amount: row.try_get("before_amount")?,
        after_amount: row.try_get("after_amount")?,
        currency: row.try_get("currency")?,
        committer_id: row.try_get::<i64, _>("committer_id")? as u64,
        status,
        remark: row.try_get("remark")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        rollback_before_amount: row.try_get("rollback_before_amount")?,
        rollback_after_amount: row.try_get("rollback_after_amount")?,
        rollbacker_id: row.try_get::<Option<i64>, _>("rollbacker_id")?.map(|v| v as u64),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::models::{OrderColumn, OrderDirection};
    use chrono::{TimeZone, Utc};

    #[test]
    fn empty_filter_builds_bare_where() {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM transaction_record");
        push_filters(&mut qb, &RecordFilter::default());
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM transaction_record WHERE 1 = 1");
    }

    #[test]
    fn full_filter_binds_every_condition() {
        let filter = RecordFilter {
            id: Some(5),
            member_id: Some(9),
            committer_id: Some(11),
            rollbacker_id: Some(13),
            currency: vec!["USD".into(), "EUR".into()],
            action: vec![TransactionAction::Deposit, TransactionAction::Withdraw],
            status: vec![TransactionStatus::Success],
            created_from: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            created_to: Some(Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap()),
            order_by: vec![],
        };
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM transaction_record");
        push_filters(&mut qb, &filter);

        let sql = qb.sql().to_string();
        for clause in [
            "id = $1",
            "member_id = $2",
            "committer_id = $3",
            "rollbacker_id = $4",
            "currency = ANY($5)",
            "action = ANY($6)",
            "status = ANY($7)",
            "created_at >= $8",
            "created_at <= $9",
        ] {
            assert!(sql.contains(clause), "missing {:?} in {}", clause, sql);
        }
    }

    #[test]
    fn open_ended_created_range() {
        let filter = RecordFilter {
            created_from: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            ..RecordFilter::default()
        };
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM transaction_record");
        push_filters(&mut qb, &filter);

        let sql = qb.sql().to_string();
        assert!(sql.contains("created_at >= $1"), "sql was: {}", sql);
        assert!(!sql.contains("created_at <="), "sql was: {}", sql);
    }

    #[test]
    fn order_clause_preserves_key_order() {
        let orders = [
            RecordOrder {
                column: OrderColumn::CreatedAt,
                direction: OrderDirection::Desc,
            },
            RecordOrder {
                column: OrderColumn::MemberId,
                direction: OrderDirection::Asc,
            },
        ];
        let mut qb = QueryBuilder::new("SELECT 1");
        push_order(&mut qb, &orders);
        assert_eq!(qb.sql(), "SELECT 1 ORDER BY created_at DESC, member_id ASC");
    }

    #[test]
    fn no_order_keys_appends_nothing() {
        let mut qb = QueryBuilder::new("SELECT 1");
        push_order(&mut qb, &[]);
        assert_eq!(qb.sql(), "SELECT 1");
    }
}
