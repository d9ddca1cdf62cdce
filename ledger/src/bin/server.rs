//! Arena ledger server.
//!
//! Serves the ledger API and, on a separate port, Prometheus metrics.
//!
//! # Usage
//!
//! ```bash
//! # In-memory store
//! cargo run --bin arena-server
//!
//! # PostgreSQL store
//! STORE_BACKEND=postgres DATABASE_URL=postgres://localhost/arena cargo run --bin arena-server
//! ```

use anyhow::Context;
use arena_ledger::{AppState, ArenaApp, Config, build_router, metrics::register_business_metrics};
use arena_runtime::metrics::MetricsServer;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.server.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        backend = ?config.store.backend,
        save_retries = config.store.save_retries,
        "Configuration loaded"
    );

    let metrics_addr: SocketAddr = config
        .server
        .metrics_addr()
        .parse()
        .context("invalid metrics address")?;
    let mut metrics_server = MetricsServer::new(metrics_addr);
    metrics_server.start()?;
    register_business_metrics();
    let metrics_server = Arc::new(metrics_server);

    let app = ArenaApp::new(&config.store).await?;
    let router = build_router(AppState::from(app));

    let (shutdown, _) = broadcast::channel::<()>(1);

    let addr = config.server.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "Ledger API listening");

    let mut server_shutdown = shutdown.subscribe();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.recv().await;
            })
            .await
    });

    let metrics_app = axum::Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let metrics_server = Arc::clone(&metrics_server);
            async move { metrics_server.render().unwrap_or_default() }
        }),
    );
    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr)
        .await
        .with_context(|| format!("failed to bind {metrics_addr}"))?;
    tracing::info!(addr = %metrics_addr, "Prometheus metrics available at /metrics");

    let mut metrics_shutdown = shutdown.subscribe();
    let metrics_handle = tokio::spawn(async move {
        axum::serve(metrics_listener, metrics_app)
            .with_graceful_shutdown(async move {
                let _ = metrics_shutdown.recv().await;
            })
            .await
    });

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(error) => tracing::error!(%error, "Unable to listen for shutdown signal"),
    }
    let _ = shutdown.send(());

    match server_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => tracing::warn!(%error, "API server stopped with an error"),
        Err(error) => tracing::warn!(%error, "API server task failed"),
    }
    match metrics_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => tracing::warn!(%error, "Metrics server stopped with an error"),
        Err(error) => tracing::warn!(%error, "Metrics server task failed"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
