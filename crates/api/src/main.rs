use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

use ledgerd_api::app::{build_app, AppServices};
use ledgerd_api::config::AppConfig;
use ledgerd_infra::PostgresLedgerStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid environment configuration")?;
    ledgerd_observability::init(config.env.is_development());

    let mut store =
        PostgresLedgerStore::connect(&config.database_url, config.database_max_connections)
            .await
            .context("failed to connect to database")?;
    if let Some(timeout) = config.lock_timeout {
        store = store.with_lock_timeout(timeout);
    }
    store.migrate().await.context("failed to apply schema")?;

    let services = Arc::new(AppServices::new(Arc::new(store)));
    let app = build_app(services);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(addr = %listener.local_addr()?, env = ?config.env, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
