use bookstore_core::{setup_tracing, BookstoreSystem, Config, SystemError};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), SystemError> {
    setup_tracing();

    let config = Config::from_env()?;
    info!(
        db_path = %config.db_path.display(),
        port = config.server_port,
        report_interval_secs = config.report_interval.as_secs(),
        "Starting bookstore"
    );

    let system = BookstoreSystem::start(&config).await.inspect_err(|e| {
        error!(error = %e, "Startup failed");
    })?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");

    system.shutdown().await
}
