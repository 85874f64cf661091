use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Book;

/// Aggregate quantity sold for one book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSales {
    pub book: Book,
    pub quantity: u64,
}

/// Point-in-time sales summary. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesReport {
    pub timestamp: DateTime<Utc>,
    pub total_revenue: f64,
    pub total_orders: usize,
    pub top_selling_books: Vec<BookSales>,
}
