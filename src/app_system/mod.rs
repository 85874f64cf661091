//! System orchestration, startup, and shutdown logic.

pub mod bookstore_system;
pub mod tracing;

pub use self::tracing::setup_tracing;
pub use bookstore_system::BookstoreSystem;
