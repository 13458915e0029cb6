//! Simple Ledger server
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────────┐    ┌──────────┐
//! │  Config  │───▶│ Gateway  │───▶│    Ledger    │───▶│  Store   │
//! │  (YAML)  │    │  (axum)  │    │ (runner/tx)  │    │ (pg/mem) │
//! └──────────┘    └──────────┘    └──────────────┘    └──────────┘
//! ```
//!
//! Usage: `simple_ledger [--env dev]`, reads `config/{env}.yaml`.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use simple_ledger::config::{AppConfig, StoreBackend};
use simple_ledger::db::Database;
use simple_ledger::gateway::{self, AppState};
use simple_ledger::ledger::{Ledger, LedgerService};
use simple_ledger::store::{MemoryStore, PgStore};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

async fn build_ledger(config: &AppConfig) -> anyhow::Result<Arc<dyn LedgerService>> {
    match config.store.backend {
        StoreBackend::Postgres => {
            let url = config
                .store
                .postgres_url
                .as_deref()
                .context("postgres backend selected without postgres_url")?;
            let db = Database::connect(url, config.store.max_connections)
                .await
                .context("failed to connect to PostgreSQL")?;
            db.init_schema().await.context("failed to create schema")?;
            Ok(Arc::new(Ledger::new(Arc::new(PgStore::new(
                db.pool().clone(),
            )))))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store: data is lost on exit");
            Ok(Arc::new(Ledger::new(Arc::new(MemoryStore::with_lock_timeout(
                config.lock_timeout(),
            )))))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env)?;
    let _log_guard = simple_ledger::logging::init_logging(&config);

    tracing::info!(
        "Starting Simple Ledger in {} mode (build {})",
        env,
        env!("GIT_HASH")
    );

    let ledger = build_ledger(&config).await?;
    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(
        ledger,
        config.transfer_timeout(),
        shutdown.clone(),
    ));

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        signal.cancel();
    });

    gateway::run_server(&config.server_address(), state, shutdown).await
}
