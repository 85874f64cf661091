//! Concurrent in-memory bookstore: entity store with JSON snapshots, sales
//! report aggregation and a background report scheduler.

pub mod app_system;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod report;
pub mod scheduler;
pub mod store;


pub use app_system::{setup_tracing, BookstoreSystem};
pub use config::Config;
pub use error::{ErrorClass, ReportError, SchedulerError, StoreError, SystemError};
pub use store::Store;
