use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::config::Config;
use crate::error::SystemError;
use crate::metrics::ApiHits;
use crate::report::ReportStore;
use crate::scheduler::ReportScheduler;
use crate::store::Store;

/// Owns the store, the report store and the scheduler for one process.
///
/// Request handlers share `store`, `reports` and `metrics`; the scheduler is
/// only reachable through [`BookstoreSystem::shutdown`].
pub struct BookstoreSystem {
    pub store: Arc<Store>,
    pub reports: Arc<ReportStore>,
    pub metrics: Arc<ApiHits>,
    scheduler: ReportScheduler,
}

impl BookstoreSystem {
    /// Loads the snapshot and starts the report scheduler. A snapshot that
    /// exists but does not parse aborts startup.
    #[instrument(skip(config), fields(db_path = %config.db_path.display()))]
    pub async fn start(config: &Config) -> Result<Self, SystemError> {
        info!("Loading database");
        let store = Arc::new(Store::open(&config.db_path).await?);
        let reports = Arc::new(ReportStore::new(config.report_output_dir.clone()));
        let metrics = Arc::new(ApiHits::new());

        let mut scheduler = ReportScheduler::new(
            Arc::clone(&store),
            Arc::clone(&reports),
            metrics.clone(),
            config.report_interval,
        );
        scheduler.start()?;

        info!(
            interval_secs = config.report_interval.as_secs(),
            "Bookstore system started"
        );
        Ok(Self {
            store,
            reports,
            metrics,
            scheduler,
        })
    }

    /// Stops the scheduler, waiting for an in-flight report to finish.
    pub async fn shutdown(mut self) -> Result<(), SystemError> {
        info!("Shutting down system...");
        if let Err(e) = self.scheduler.stop().await {
            error!(error = %e, "Report scheduler did not stop cleanly");
            return Err(e.into());
        }
        info!("System shutdown complete.");
        Ok(())
    }
}
