use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::domain::SalesReport;
use crate::error::ReportError;
use crate::store::write_atomic;

/// Append-only list of generated reports, optionally mirrored to one JSON
/// file per report.
pub struct ReportStore {
    reports: RwLock<Vec<SalesReport>>,
    output_dir: Option<PathBuf>,
}

/// File name for a report, derived from its generation time and its position
/// in the list so reports from the same millisecond get distinct files.
pub(crate) fn report_file_name(timestamp: &DateTime<Utc>, sequence: usize) -> String {
    format!(
        "sales_report_{}_{sequence}.json",
        timestamp.format("%Y-%m-%d_%H-%M-%S_%3f")
    )
}

impl ReportStore {
    pub fn new(output_dir: Option<PathBuf>) -> Self {
        Self {
            reports: RwLock::new(Vec::new()),
            output_dir,
        }
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// Appends the report. If an output directory is configured the report
    /// is also written there, and a failed write is returned to the caller.
    /// The in-memory append stands either way. The list is not locked while
    /// the file is written.
    #[instrument(skip_all, fields(timestamp = %report.timestamp))]
    pub async fn save_report(&self, report: SalesReport) -> Result<(), ReportError> {
        let sequence = {
            let mut reports = self.reports.write().await;
            reports.push(report.clone());
            reports.len()
        };

        let Some(dir) = &self.output_dir else {
            return Ok(());
        };
        let path = dir.join(report_file_name(&report.timestamp, sequence));
        let bytes = serde_json::to_vec_pretty(&report)
            .map_err(|e| ReportError::Persistence(format!("failed to encode report: {e}")))?;
        write_atomic(&path, &bytes).await.map_err(|e| {
            ReportError::Persistence(format!("failed to write {}: {e}", path.display()))
        })?;

        debug!(path = %path.display(), "Report file written");
        Ok(())
    }

    pub async fn latest_report(&self) -> Result<SalesReport, ReportError> {
        self.reports
            .read()
            .await
            .last()
            .cloned()
            .ok_or(ReportError::NotFound)
    }

    /// Reports generated strictly after `cutoff`.
    pub async fn reports_since(&self, cutoff: DateTime<Utc>) -> Vec<SalesReport> {
        self.reports
            .read()
            .await
            .iter()
            .filter(|r| r.timestamp > cutoff)
            .cloned()
            .collect()
    }

    pub async fn reports_since_days(&self, days: i64) -> Vec<SalesReport> {
        self.reports_since(Utc::now() - Duration::days(days)).await
    }

    pub async fn list_all_reports(&self) -> Vec<SalesReport> {
        self.reports.read().await.clone()
    }
}
