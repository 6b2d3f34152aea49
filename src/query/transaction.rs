//! Client-tagged remote transactions.
//!
//! A transaction is only a remote id: BEGIN, COMMIT and ROLLBACK carry it, and so must every
//! statement the caller wants inside the transaction. Statements are not pinned to one
//! connection or node; each one goes through the pool independently.

use crate::error::{ClientError, ClientResult};
use crate::events::ClientEvent;
use crate::query::executor::QueryExecutor;
use crate::query::types::{Consistency, QueryOptions, QueryResult};
use chrono::{DateTime, Utc};
use log::{info, warn};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;

/// Generate an id of the form `tx-<epoch millis>-<random>`
pub fn generate_transaction_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();
    format!("tx-{}-{}", Utc::now().timestamp_millis(), suffix)
}

/// Starts transactions on top of a [`QueryExecutor`]
#[derive(Debug, Clone)]
pub struct TransactionCoordinator {
    executor: Arc<QueryExecutor>,
}

impl TransactionCoordinator {
    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Issue `BEGIN TRANSACTION` under a fresh id
    pub async fn begin_transaction(&self, consistency: Consistency) -> ClientResult<TransactionHandle> {
        let id = generate_transaction_id();
        let options = QueryOptions::new()
            .with_consistency(consistency)
            .with_transaction_id(id.clone());
        self.executor.query("BEGIN TRANSACTION", &[], options).await?;

        info!("Transaction {} started ({})", id, consistency);
        self.executor.observers().emit(ClientEvent::TransactionStarted {
            transaction_id: id.clone(),
        });
        Ok(TransactionHandle {
            id,
            consistency,
            started_at: Utc::now(),
            executor: self.executor.clone(),
        })
    }
}

/// An open remote transaction.
///
/// `commit` and `rollback` consume the handle. If their wire call fails the remote state is
/// unknown; the error is returned and no compensating statement is sent.
#[derive(Debug)]
pub struct TransactionHandle {
    id: String,
    consistency: Consistency,
    started_at: DateTime<Utc>,
    executor: Arc<QueryExecutor>,
}

impl TransactionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn consistency(&self) -> Consistency {
        self.consistency
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Options tagging a statement with this transaction
    pub fn options(&self) -> QueryOptions {
        QueryOptions::new()
            .with_consistency(self.consistency)
            .with_transaction_id(self.id.clone())
    }

    /// Execute a statement inside this transaction
    pub async fn query(&self, sql: &str, params: &[Value]) -> ClientResult<QueryResult> {
        self.executor.query(sql, params, self.options()).await
    }

    pub async fn commit(self) -> ClientResult<()> {
        self.finish("COMMIT", "commit").await?;
        self.executor.observers().emit(ClientEvent::TransactionCommitted {
            transaction_id: self.id.clone(),
        });
        Ok(())
    }

    pub async fn rollback(self) -> ClientResult<()> {
        self.finish("ROLLBACK", "rollback").await?;
        self.executor.observers().emit(ClientEvent::TransactionRolledBack {
            transaction_id: self.id.clone(),
        });
        Ok(())
    }

    async fn finish(&self, sql: &str, operation: &'static str) -> ClientResult<()> {
        match self.executor.query(sql, &[], self.options()).await {
            Ok(_) => {
                info!("Transaction {} {}", self.id, operation);
                Ok(())
            }
            Err(e) => {
                warn!("Transaction {} {} failed: {}", self.id, operation, e);
                Err(ClientError::Transaction {
                    transaction_id: self.id.clone(),
                    operation,
                    source: Box::new(e),
                })
            }
        }
    }
}
