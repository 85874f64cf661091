use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Book;

/// Lifecycle of an order. `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Created,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Created)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Ok(OrderStatus::Created),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// One line of a placed order, with the book as it was when ordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub book_id: u64,
    pub quantity: u32,
    pub book: Book,
}

/// Represents a customer order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub customer_id: u64,
    pub items: Vec<LineItem>,
    pub total_price: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Requested line of a new order.
#[derive(Debug, Clone, Copy)]
pub struct OrderLine {
    pub book_id: u64,
    pub quantity: u32,
}

/// Payload for placing an order. Price and status are decided by the store.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: u64,
    pub items: Vec<OrderLine>,
}

impl NewOrder {
    pub fn new(customer_id: u64) -> Self {
        Self {
            customer_id,
            items: Vec::new(),
        }
    }

    pub fn line(mut self, book_id: u64, quantity: u32) -> Self {
        self.items.push(OrderLine { book_id, quantity });
        self
    }
}
