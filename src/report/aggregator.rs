use std::collections::HashMap;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::domain::{BookSales, OrderStatus, SalesReport};
use crate::error::StoreError;
use crate::store::{check_cancelled, Store};

/// Length of the top sellers list.
pub const TOP_SELLERS: usize = 10;

/// Reduces the store's orders into a [`SalesReport`].
///
/// Every order counts towards `total_orders`; only completed orders add
/// revenue and sold quantities. Books with equal quantities keep the order in
/// which they were first seen.
#[instrument(skip_all)]
pub async fn generate_sales_report(
    ctx: &CancellationToken,
    store: &Store,
) -> Result<SalesReport, StoreError> {
    let orders = store.list_orders(ctx).await?;

    let mut total_revenue = 0.0;
    let mut sales: Vec<BookSales> = Vec::new();
    let mut positions: HashMap<u64, usize> = HashMap::new();

    for order in &orders {
        check_cancelled(ctx)?;
        if order.status != OrderStatus::Completed {
            continue;
        }
        total_revenue += order.total_price;

        for item in &order.items {
            let quantity = u64::from(item.quantity);
            match positions.get(&item.book_id) {
                Some(&index) => sales[index].quantity += quantity,
                None => {
                    positions.insert(item.book_id, sales.len());
                    sales.push(BookSales {
                        book: item.book.clone(),
                        quantity,
                    });
                }
            }
        }
    }

    sales.sort_by(|a, b| b.quantity.cmp(&a.quantity));
    sales.truncate(TOP_SELLERS);

    debug!(orders = orders.len(), books_sold = positions.len(), "Orders aggregated");
    Ok(SalesReport {
        timestamp: Utc::now(),
        total_revenue,
        total_orders: orders.len(),
        top_selling_books: sales,
    })
}
