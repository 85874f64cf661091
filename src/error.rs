use thiserror::Error;

use crate::domain::OrderStatus;

/// How an error surfaces at the request boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The addressed resource does not exist.
    NotFound,
    /// The request was understood but violates a rule of the store.
    Rejected,
    /// The server could not finish the work.
    Unavailable,
}

impl ErrorClass {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorClass::NotFound => 404,
            ErrorClass::Rejected => 400,
            ErrorClass::Unavailable => 503,
        }
    }
}

/// Errors returned by the entity store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: u64 },
    #[error("Referential integrity violation: {0}")]
    ReferentialIntegrity(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Insufficient stock for book {book_id}: requested {requested}, available {available}")]
    InsufficientStock {
        book_id: u64,
        requested: u32,
        available: u32,
    },
    #[error("Order {id} is {status} and cannot change state")]
    InvalidState { id: u64, status: OrderStatus },
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Operation cancelled")]
    Cancelled,
}

impl StoreError {
    pub fn class(&self) -> ErrorClass {
        match self {
            StoreError::NotFound { .. } => ErrorClass::NotFound,
            StoreError::ReferentialIntegrity(_)
            | StoreError::Conflict(_)
            | StoreError::InsufficientStock { .. }
            | StoreError::InvalidState { .. }
            | StoreError::Validation(_) => ErrorClass::Rejected,
            StoreError::Persistence(_) | StoreError::Cancelled => ErrorClass::Unavailable,
        }
    }
}

/// Errors returned by report generation and the report store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReportError {
    #[error("No reports available")]
    NotFound,
    #[error("Report persistence error: {0}")]
    Persistence(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReportError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ReportError::NotFound => ErrorClass::NotFound,
            ReportError::Persistence(_) => ErrorClass::Unavailable,
            ReportError::Store(e) => e.class(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchedulerError {
    #[error("Scheduler already started")]
    AlreadyStarted,
    #[error("Scheduler is not running")]
    NotRunning,
    #[error("Scheduler task failed: {0}")]
    TaskFailed(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Errors raised while bringing the whole system up or down.
#[derive(Debug, Error)]
pub enum SystemError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to load database: {0}")]
    Load(#[from] StoreError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
