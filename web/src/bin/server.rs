//! Access request HTTP server.
//!
//! Reads its configuration from the environment (and `.env`), applies the database
//! migrations, and serves the API until SIGINT/SIGTERM.

use access_request_core::environment::SystemClock;
use access_request_postgres::PostgresAccessRequestStore;
use access_request_runtime::AccessRequestService;
use access_request_runtime::metrics::MetricsServer;
use access_request_web::{AppState, Config, build_router};
use anyhow::Context;
use axum::{Router, routing::get};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "access_request=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting access request server");

    let config = Config::from_env();
    info!(
        host = %config.server.host,
        port = config.server.port,
        metrics_enabled = config.server.metrics_enabled,
        "Configuration loaded"
    );

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.postgres.max_connections)
        .min_connections(config.postgres.min_connections)
        .acquire_timeout(config.connect_timeout())
        .connect(&config.postgres.url)
        .await
        .context("failed to connect to the database")?;
    let store = PostgresAccessRequestStore::from_pool(pool);
    store.run_migrations().await?;
    info!("Database ready");

    if config.server.metrics_enabled {
        spawn_metrics_server(&config).await?;
    }

    let service = AccessRequestService::new(Arc::new(store), Arc::new(SystemClock))
        .with_config(config.service_config());
    let app = build_router(AppState::new(service));

    let addr = config.server_addr().context("invalid HOST/PORT")?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.changed().await;
            })
            .await
    });

    tokio::select! {
        result = &mut server => {
            result??;
            info!("Server stopped");
            return Ok(());
        }
        () = shutdown_signal() => {}
    }

    let _ = stop_tx.send(true);
    match tokio::time::timeout(config.shutdown_timeout(), server).await {
        Ok(result) => result??,
        Err(_) => warn!(
            timeout_secs = config.server.shutdown_timeout,
            "Graceful shutdown timed out, dropping open connections"
        ),
    }

    info!("Server stopped");
    Ok(())
}

/// Install the Prometheus recorder and serve `GET /metrics` on `METRICS_PORT`.
async fn spawn_metrics_server(config: &Config) -> anyhow::Result<()> {
    let addr = config.metrics_addr().context("invalid HOST/METRICS_PORT")?;
    let mut metrics = MetricsServer::new(addr);
    metrics.start()?;
    let metrics = Arc::new(metrics);

    let app = Router::new().route(
        "/metrics",
        get(move || {
            let metrics = Arc::clone(&metrics);
            async move { metrics.render().unwrap_or_default() }
        }),
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Metrics listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Metrics server failed");
        }
    });
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
