//! nodesql: one logical SQL connection over many decentralized HTTP database nodes.
//!
//! The crate pools logical connections across independently operated nodes, tracks node
//! health, retries failed statements against a different node, groups statements under
//! client-generated transaction ids, and composes SQL from caller-supplied identifiers only
//! after validating them against a strict allow-list.
//!
//! The entry point is [`DatabaseClient`]:
//!
//! ```rust,no_run
//! use nodesql::{ClientConfig, DatabaseClient};
//! use serde_json::json;
//!
//! # async fn run() -> nodesql::ClientResult<()> {
//! let config = ClientConfig::new(
//!     vec!["http://node-1:4661".to_string(), "http://node-2:4661".to_string()],
//!     "app-db",
//!     "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60",
//! );
//! let client = DatabaseClient::new(config)?;
//! client.initialize().await?;
//!
//! let result = client.query("SELECT * FROM users WHERE id = $1", &[json!(7)], Default::default()).await?;
//! println!("{} rows from {}", result.row_count, result.node);
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod events;
pub mod network;
pub mod pool;
pub mod query;
pub mod schema;

pub use client::DatabaseClient;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use events::{ClientEvent, ClientObserver, EventObservers, ObserverId};
pub use network::health::{NodeHealth, NodeHealthMonitor};
pub use network::{HttpTransport, NodeTransport, TransportError, TransportResult};
#[cfg(any(test, feature = "mock"))]
pub use network::mock::MockTransport;
pub use pool::{ConnectionLease, ConnectionPool, PoolStats, PooledConnection};
pub use query::executor::QueryExecutor;
pub use query::transaction::{TransactionCoordinator, TransactionHandle};
pub use query::types::{Consistency, QueryOptions, QueryResult, Row};
pub use schema::identifier::{validate_sql_identifier, IdentifierKind};
pub use schema::operations::SchemaOperations;
pub use schema::types::{
    ColumnDefault, ColumnDefinition, ColumnType, IndexDefinition, OrderDirection, SelectOptions,
    SqlStatement, TableSchema,
};
