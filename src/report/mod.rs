//! Sales reporting: aggregation over the store and the list of generated
//! reports.

mod aggregator;
mod report_store;

pub use aggregator::{generate_sales_report, TOP_SELLERS};
pub use report_store::ReportStore;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::domain::SalesReport;
use crate::error::ReportError;
use crate::store::Store;

/// One aggregation cycle: generate a report and hand it to the report store.
///
/// Used by the scheduler on every tick and by on-demand requests.
#[instrument(skip_all)]
pub async fn generate_and_store(
    ctx: &CancellationToken,
    store: &Store,
    reports: &ReportStore,
) -> Result<SalesReport, ReportError> {
    let report = generate_sales_report(ctx, store).await?;
    reports.save_report(report.clone()).await?;
    info!(
        total_revenue = report.total_revenue,
        total_orders = report.total_orders,
        "Sales report generated"
    );
    Ok(report)
}
