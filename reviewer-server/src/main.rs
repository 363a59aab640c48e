use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use reviewer_core::ReviewerAssigner;
use reviewer_server::config::{Config, StorageKind};
use reviewer_server::repository::{InMemoryRepository, SqliteRepository};
use reviewer_server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration from environment")?;

    // RUST_LOG wins over LOG_LEVEL when both are set.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("Invalid LOG_LEVEL")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting reviewer assignment service");

    let assigner = ReviewerAssigner::new(config.max_reviewers);
    info!(
        "Assigning up to {} reviewers per pull request",
        assigner.max_reviewers()
    );
    let app_state = match config.storage {
        StorageKind::Sqlite => {
            let db_path = config.database_path();
            info!("Using state database: {}", db_path.display());
            let path = db_path.clone();
            let repo = tokio::task::spawn_blocking(move || SqliteRepository::new(&path))
                .await
                .context("spawn_blocking panicked")?
                .with_context(|| format!("Failed to open SQLite database {}", db_path.display()))?;
            AppState::with_repository(Arc::new(repo), assigner, config.rng_seed)
        }
        StorageKind::Memory => {
            info!("Using in-memory storage; state is lost on restart");
            AppState::with_repository(
                Arc::new(InMemoryRepository::new()),
                assigner,
                config.rng_seed,
            )
        }
    };

    let app = reviewer_server::router(Arc::new(app_state)).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::new(config.request_timeout)),
    );

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
