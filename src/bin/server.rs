//! HTTP server for the task tracker.

use std::sync::Arc;

use dotenv::dotenv;
use tasktrack::config::{ServerConfig, StorageMode};
use tasktrack::repository::{InMemoryTaskRepository, SqliteTaskRepository, TaskRepository};
use tasktrack::server::{router, AppState};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tasktrack=debug,tower_http=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!("Invalid configuration: {}", error);
            std::process::exit(1);
        }
    };

    let repository: Arc<dyn TaskRepository> = match config.storage_mode {
        StorageMode::InMemory => {
            tracing::info!("Using in-memory task storage");
            Arc::new(InMemoryTaskRepository::new())
        }
        StorageMode::Sqlite => match SqliteTaskRepository::connect(&config.database_url).await {
            Ok(repository) => {
                tracing::info!(url = %config.database_url, "Using SQLite task storage");
                Arc::new(repository)
            }
            Err(error) => {
                tracing::error!("Failed to open database {}: {}", config.database_url, error);
                std::process::exit(1);
            }
        },
    };

    let app = router(AppState::new(repository));

    let address = match config.address() {
        Ok(address) => address,
        Err(error) => {
            tracing::error!("Invalid listen address: {}", error);
            std::process::exit(1);
        }
    };
    let listener = match TcpListener::bind(address).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!("Failed to bind to {}: {}", address, error);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", address);

    if let Err(error) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", error);
        std::process::exit(1);
    }

    tracing::info!("Server shut down");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", error);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!("Failed to install SIGTERM handler: {}", error);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
