//! Statement execution: options and results, the retrying executor, and transactions

pub mod executor;
pub mod transaction;
pub mod types;

pub use executor::QueryExecutor;
pub use transaction::{generate_transaction_id, TransactionCoordinator, TransactionHandle};
pub use types::{Consistency, QueryOptions, QueryResult, Row};
