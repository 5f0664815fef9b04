//! Embedded schema for the wallet ledger database

use sqlx::PgPool;

/// Create tables and indexes if they do not exist yet.
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Initializing wallet ledger schema...");

    sqlx::query(CREATE_WALLET_TABLE).execute(pool).await?;
    sqlx::query(CREATE_WALLET_MEMBER_CURRENCY_INDEX)
        .execute(pool)
        .await?;
    sqlx::query(CREATE_TRANSACTION_RECORD_TABLE)
        .execute(pool)
        .await?;
    sqlx::query(CREATE_RECORD_WALLET_CREATED_INDEX)
        .execute(pool)
        .await?;
    sqlx::query(CREATE_RECORD_MEMBER_STATUS_INDEX)
        .execute(pool)
        .await?;

    tracing::info!("Wallet ledger schema initialized");
    Ok(())
}

const CREATE_WALLET_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS wallet (
    id BIGSERIAL PRIMARY KEY,
    member_id BIGINT NOT NULL,
    currency TEXT NOT NULL,
    amount NUMERIC NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    deleted_at TIMESTAMPTZ
)
"#;

// One live wallet per (member, currency); soft-deleted rows do not count.
const CREATE_WALLET_MEMBER_CURRENCY_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS wallet_member_currency_idx
    ON wallet (member_id, currency)
    WHERE deleted_at IS NULL
"#;

const CREATE_TRANSACTION_RECORD_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transaction_record (
    id BIGSERIAL PRIMARY KEY,
    member_id BIGINT NOT NULL,
    wallet_id BIGINT NOT NULL,
    action SMALLINT NOT NULL,
    amount NUMERIC NOT NULL,
    before_amount NUMERIC,
    after_amount NUMERIC,
    currency TEXT NOT NULL,
    committer_id BIGINT NOT NULL,
    status SMALLINT NOT NULL,
    remark TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    rollback_before_amount NUMERIC,
    rollback_after_amount NUMERIC,
    rollbacker_id BIGINT
)
"#;

const CREATE_RECORD_WALLET_CREATED_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS transaction_record_wallet_created_idx
    ON transaction_record (wallet_id, created_at)
"#;

const CREATE_RECORD_MEMBER_STATUS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS transaction_record_member_status_idx
    ON transaction_record (member_id, status)
"#;
