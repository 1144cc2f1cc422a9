use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use linkpile_api::{
    api::{create_router, AppState},
    config::{Config, StorageBackend},
    db::{self, ArticleRepository, InMemoryArticleRepository, PgArticleRepository},
    services::{HttpMetadataFetcher, RetryWorker},
    shutdown::drain_tasks,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,linkpile_api=debug,sqlx=warn")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let repo: Arc<dyn ArticleRepository> = match config.storage {
        StorageBackend::Postgres => {
            let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
            db::run_migrations(&pool).await?;
            Arc::new(PgArticleRepository::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data is lost on restart");
            Arc::new(InMemoryArticleRepository::new())
        }
    };

    let fetcher = Arc::new(HttpMetadataFetcher::new(&config.fetcher())?);
    let shutdown = CancellationToken::new();

    let (state, ingestion_supervisor) = AppState::new(
        repo.clone(),
        fetcher,
        config.recommendation(),
        shutdown.clone(),
    );
    let retry_worker =
        RetryWorker::new(repo, state.pipeline.clone(), config.retry()).spawn(shutdown.clone());

    let app = create_router(state);

    let bind_addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!(address = %listener.local_addr()?, "Server listening");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            server_shutdown.cancel();
        })
        .await?;

    // Covers the server exiting on its own
    shutdown.cancel();

    drain_tasks(
        vec![
            ("ingestion supervisor", ingestion_supervisor),
            ("retry worker", retry_worker),
        ],
        config.shutdown_grace(),
    )
    .await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, initiating graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
