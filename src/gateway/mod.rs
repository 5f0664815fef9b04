//! HTTP gateway: the RPC surface other services call
//!
//! Thin by design: request validation and response shaping live in
//! `handlers`, everything stateful lives behind `AppState`.

pub mod handlers;
pub mod state;
pub mod types;

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::db::Database;
use crate::ledger::LedgerStore;
use state::AppState;
use types::{RpcReply, codes};

/// Start the RPC server and block until shutdown.
pub async fn run_server(
    config: &AppConfig,
    db: Arc<Database>,
    store: Arc<dyn LedgerStore>,
) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(
        db,
        store,
        config.gateway.max_page_size,
        shutdown.clone(),
    ));

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/v1/wallets",
            post(handlers::create_wallet).get(handlers::get_wallets),
        )
        .route("/api/v1/wallets/{id}", delete(handlers::delete_wallet))
        .route("/api/v1/transactions", post(handlers::submit_transaction))
        .route(
            "/api/v1/transactions/query",
            post(handlers::query_transaction_records),
        )
        .route(
            "/api/v1/transactions/{id}",
            get(handlers::get_transaction_record),
        )
        .route(
            "/api/v1/transactions/{id}/rollback",
            post(handlers::rollback_transaction),
        )
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.gateway.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Wallet ledger RPC listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

/// Cancel in-flight engine loops, then let the server drain.
async fn shutdown_signal(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
    token.cancel();
}

/// Handler panics become a logged 500 instead of a dropped connection.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!(
        panic = %detail,
        backtrace = %std::backtrace::Backtrace::force_capture(),
        "panic in request handler"
    );

    let body = axum::Json(RpcReply::failed(codes::INTERNAL, "internal error"));
    (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
}
