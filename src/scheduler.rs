//! Background sales report generation.
//!
//! The scheduler is a small state machine: `Idle` until [`ReportScheduler::start`],
//! `Running` while its task ticks, `Stopped` once [`ReportScheduler::stop`]
//! has waited for the task to exit. Stopping never interrupts a report save
//! that is already under way.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::error::{ReportError, SchedulerError, StoreError};
use crate::metrics::HitMetrics;
use crate::report::{self, ReportStore};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

enum Lifecycle {
    Idle,
    Running {
        shutdown: CancellationToken,
        handle: JoinHandle<()>,
    },
    Stopped,
}

pub struct ReportScheduler {
    store: Arc<Store>,
    reports: Arc<ReportStore>,
    metrics: Arc<dyn HitMetrics>,
    interval: Duration,
    lifecycle: Lifecycle,
}

impl ReportScheduler {
    pub fn new(
        store: Arc<Store>,
        reports: Arc<ReportStore>,
        metrics: Arc<dyn HitMetrics>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            reports,
            metrics,
            interval,
            lifecycle: Lifecycle::Idle,
        }
    }

    pub fn state(&self) -> SchedulerState {
        match self.lifecycle {
            Lifecycle::Idle => SchedulerState::Idle,
            Lifecycle::Running { .. } => SchedulerState::Running,
            Lifecycle::Stopped => SchedulerState::Stopped,
        }
    }

    /// Spawns the report task. The first report is generated right away, the
    /// next ones every `interval`.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        if !matches!(self.lifecycle, Lifecycle::Idle) {
            return Err(SchedulerError::AlreadyStarted);
        }

        let shutdown = CancellationToken::new();
        let worker = ReportWorker {
            store: Arc::clone(&self.store),
            reports: Arc::clone(&self.reports),
            metrics: Arc::clone(&self.metrics),
            interval: self.interval,
            shutdown: shutdown.clone(),
        };
        let handle = tokio::spawn(worker.run());

        self.lifecycle = Lifecycle::Running { shutdown, handle };
        Ok(())
    }

    /// Signals the task and waits until it has exited.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<(), SchedulerError> {
        match std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running { shutdown, handle } => {
                shutdown.cancel();
                handle
                    .await
                    .map_err(|e| SchedulerError::TaskFailed(e.to_string()))?;
                info!("Report scheduler stopped");
                Ok(())
            }
            other => {
                self.lifecycle = other;
                Err(SchedulerError::NotRunning)
            }
        }
    }
}

impl Drop for ReportScheduler {
    fn drop(&mut self) {
        if let Lifecycle::Running { shutdown, .. } = &self.lifecycle {
            shutdown.cancel();
        }
    }
}

struct ReportWorker {
    store: Arc<Store>,
    reports: Arc<ReportStore>,
    metrics: Arc<dyn HitMetrics>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl ReportWorker {
    #[instrument(name = "report_scheduler", skip(self))]
    async fn run(self) {
        info!(interval_secs = self.interval.as_secs_f64(), "Report scheduler started");

        self.run_cycle().await;

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("Report scheduler stopping");
                    break;
                }
                _ = ticker.tick() => self.run_cycle().await,
            }
        }
    }

    /// Failures are logged and the next tick tries again.
    async fn run_cycle(&self) {
        debug!("Generating sales report");
        match report::generate_and_store(&self.shutdown, &self.store, &self.reports).await {
            Ok(_) => self.metrics.reset_hits(),
            Err(ReportError::Store(StoreError::Cancelled)) => {
                debug!("Report cycle interrupted by shutdown");
            }
            Err(e) => error!(error = %e, "Report cycle failed"),
        }
    }
}
