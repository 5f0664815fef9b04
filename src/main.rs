use std::sync::Arc;

use anyhow::Context;

use wallet_ledger::config::AppConfig;
use wallet_ledger::db::Database;
use wallet_ledger::ledger::{LedgerStore, PgLedger, pg};
use wallet_ledger::{gateway, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("WALLET_ENV").unwrap_or_else(|_| "dev".to_string());
    let config = AppConfig::load(&env).with_context(|| format!("loading config for env {}", env))?;

    let _log_guard = logging::init_logging(&config);
    tracing::info!(env = %env, "Starting wallet ledger service");

    let db = Arc::new(
        Database::connect(&config.database)
            .await
            .context("connecting to database")?,
    );
    pg::init_schema(db.pool())
        .await
        .context("initializing schema")?;

    let store: Arc<dyn LedgerStore> = Arc::new(PgLedger::new(db.pool().clone()));

    gateway::run_server(&config, db.clone(), store).await?;

    db.close().await;
    Ok(())
}
