//! Wallet table SQL
//!
//! The conditional amount update is the concurrency linchpin: a single UPDATE
//! whose affected-rows count is the authoritative compare-and-set signal. No
//! row locks are taken anywhere in this module.

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgExecutor, Postgres, QueryBuilder, Row};

use crate::ledger::error::LedgerError;
use crate::ledger::models::{PageInfo, PageRequest, Wallet, WalletQuery};
use crate::ledger::store::CasOutcome;
use crate::money::Money;

const SELECT_WALLET: &str = r#"
SELECT id, member_id, currency, amount, created_at, updated_at, deleted_at
FROM wallet
"#;

/// Insert a wallet with a zero balance.
pub async fn insert(
    exec: impl PgExecutor<'_>,
    member_id: u64,
    currency: &str,
) -> Result<u64, LedgerError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO wallet (member_id, currency, amount) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(member_id as i64)
    .bind(currency)
    .bind(Money::ZERO)
    .fetch_one(exec)
    .await?;

    Ok(id as u64)
}

/// Append the query predicate. Soft-deleted rows are never visible.
pub fn push_filters(qb: &mut QueryBuilder<Postgres>, query: &WalletQuery) {
    qb.push(" WHERE deleted_at IS NULL");

    if !query.ids.is_empty() {
        let ids: Vec<i64> = query.ids.iter().map(|v| *v as i64).collect();
        qb.push(" AND id = ANY(").push_bind(ids).push(")");
    }
    if !query.member_ids.is_empty() {
        let ids: Vec<i64> = query.member_ids.iter().map(|v| *v as i64).collect();
        qb.push(" AND member_id = ANY(").push_bind(ids).push(")");
    }
    if let Some(currency) = &query.currency {
        qb.push(" AND currency = ").push_bind(currency.clone());
    }
    if let Some(amount) = query.amount {
        qb.push(" AND amount = ").push_bind(amount);
    }
}

/// Load the first wallet matching the predicate.
pub async fn fetch_one(
    exec: impl PgExecutor<'_>,
    query: &WalletQuery,
) -> Result<Option<Wallet>, LedgerError> {
    let mut qb = QueryBuilder::new(SELECT_WALLET);
    push_filters(&mut qb, query);
    qb.push(" LIMIT 1");

    let row = qb.build().fetch_optional(exec).await?;
    Ok(row.map(|r| wallet_from_row(&r)).transpose()?)
}

/// List wallets matching the predicate, optionally paginated with a total
/// count over the same predicate.
pub async fn list(
    conn: &mut PgConnection,
    query: &WalletQuery,
    page: Option<&PageRequest>,
) -> Result<(Vec<Wallet>, Option<PageInfo>), LedgerError> {
    let page_info = match page {
        Some(page) => {
            let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM wallet");
            push_filters(&mut qb, query);
            let total: i64 = qb.build_query_scalar().fetch_one(&mut *conn).await?;
            Some(PageInfo::new(page, total as u64))
        }
        None => None,
    };

    let mut qb = QueryBuilder::new(SELECT_WALLET);
    push_filters(&mut qb, query);
    qb.push(" ORDER BY id");
    if let Some(page) = page {
        qb.push(" OFFSET ").push_bind(page.offset() as i64);
        qb.push(" LIMIT ").push_bind(page.limit() as i64);
    }

    let rows = qb.build().fetch_all(&mut *conn).await?;
    let mut wallets = Vec::with_capacity(rows.len());
    for row in &rows {
        wallets.push(wallet_from_row(row)?);
    }

    Ok((wallets, page_info))
}

/// Compare-and-set on the amount column.
///
/// Zero affected rows means another writer moved the amount between the
/// caller's read and this statement; the caller re-reads and retries. A row
/// that no longer exists (or was soft-deleted) is a distinct not-found error,
/// checked after the miss.
pub async fn modify_amount(
    conn: &mut PgConnection,
    wallet: &Wallet,
    new_amount: Money,
) -> Result<CasOutcome, LedgerError> {
    let result = sqlx::query(
        r#"
        UPDATE wallet SET amount = $1, updated_at = NOW()
        WHERE id = $2 AND amount = $3 AND deleted_at IS NULL
        "#,
    )
    .bind(new_amount)
    .bind(wallet.id as i64)
    .bind(wallet.amount)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() > 0 {
        return Ok(CasOutcome::Updated);
    }

    let exists =
        sqlx::query_scalar::<_, i32>("SELECT 1 FROM wallet WHERE id = $1 AND deleted_at IS NULL")
            .bind(wallet.id as i64)
            .fetch_optional(&mut *conn)
            .await?;

    match exists {
        Some(_) => Ok(CasOutcome::Conflict),
        None => Err(LedgerError::NoSuchWallet),
    }
}

/// Soft-delete a live wallet.
pub async fn soft_delete(exec: impl PgExecutor<'_>, id: u64) -> Result<(), LedgerError> {
    let result = sqlx::query(
        "UPDATE wallet SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id as i64)
    .execute(exec)
    .await?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::NoSuchWallet);
    }
    Ok(())
}

fn wallet_from_row(row: &PgRow) -> Result<Wallet, sqlx::Error> {
    Ok(Wallet {
        id: row.try_get::<i64, _>("id")? as u64,
        member_id: row.try_get::<i64, _>("member_id")? as u64,
        currency: row.try_get("currency")?,
        amount: row.try_get("amount")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_always_exclude_deleted_rows() {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM wallet");
        push_filters(&mut qb, &WalletQuery::default());
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM wallet WHERE deleted_at IS NULL"
        );
    }

    #[test]
    fn filters_combine_with_and() {
        let query = WalletQuery {
            ids: vec![7],
            member_ids: vec![42],
            currency: Some("USD".into()),
            amount: None,
        };
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM wallet");
        push_filters(&mut qb, &query);

        let sql = qb.sql().to_string();
        assert!(sql.contains("id = ANY($1)"), "sql was: {}", sql);
        assert!(sql.contains("member_id = ANY($2)"), "sql was: {}", sql);
        assert!(sql.contains("currency = $3"), "sql was: {}", sql);
        assert!(!sql.contains("amount"), "sql was: {}", sql);
    }
}
