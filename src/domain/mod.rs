pub mod author;
pub mod book;
pub mod customer;
pub mod order;
pub mod report;
pub mod search;

pub use author::*;
pub use book::*;
pub use customer::*;
pub use order::*;
pub use report::*;
pub use search::*;
