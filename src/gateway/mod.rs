pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use state::AppState;

/// Build the HTTP router. Kept separate from [`run_server`] so tests can drive
/// it without binding a socket.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/accounts",
            post(handlers::create_account).get(handlers::list_accounts),
        )
        .route("/accounts/{id}", get(handlers::get_account))
        .route("/accounts/{id}/entries", get(handlers::list_entries))
        .route("/transfers", post(handlers::create_transfer))
        .route("/transfers/{id}", get(handlers::get_transfer))
        .route("/users", post(handlers::create_user))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// Serve until `shutdown` is cancelled
pub async fn run_server(
    addr: &str,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = router(state.clone());

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "failed to bind to {}: {} (is the port already in use?)",
            addr,
            e
        )
    })?;

    tracing::info!(
        %addr,
        backend = state.ledger.backend(),
        transfer_timeout_ms = state.transfer_timeout.as_millis() as u64,
        "Gateway listening"
    );
    tracing::info!("API Docs: http://{}/docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}
