//! The client facade: one logical database over many nodes

use crate::config::ClientConfig;
use crate::crypto::RequestSigner;
use crate::error::{ClientError, ClientResult};
use crate::events::{ClientEvent, ClientObserver, EventObservers, ObserverId};
use crate::network::health::{NodeHealth, NodeHealthMonitor};
use crate::network::{HttpTransport, NodeTransport};
use crate::pool::{ConnectionPool, PoolStats};
use crate::query::executor::QueryExecutor;
use crate::query::transaction::{TransactionCoordinator, TransactionHandle};
use crate::query::types::{Consistency, QueryOptions, QueryResult, Row};
use crate::schema::operations::SchemaOperations;
use crate::schema::types::{SelectOptions, TableSchema};
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Main entry point.
///
/// Owns the health monitor, the connection pool and everything built on them. Nothing
/// touches the network until [`initialize`](Self::initialize) is called.
pub struct DatabaseClient {
    config: ClientConfig,
    health: Arc<NodeHealthMonitor>,
    pool: Arc<ConnectionPool>,
    executor: Arc<QueryExecutor>,
    transactions: TransactionCoordinator,
    schema: SchemaOperations,
    observers: Arc<EventObservers>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl DatabaseClient {
    /// Create a client that talks HTTP to the configured nodes
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let transport = HttpTransport::new().map_err(|e| {
            ClientError::Configuration(format!("Failed to build HTTP client: {}", e))
        })?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a client over a custom transport
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn NodeTransport>,
    ) -> ClientResult<Self> {
        config.validate()?;
        let signer = RequestSigner::from_hex(&config.database_id, &config.private_key)?;

        let health = Arc::new(NodeHealthMonitor::new(
            config.nodes.clone(),
            config.health_check_timeout(),
            transport.clone(),
        )?);
        let pool = Arc::new(ConnectionPool::new(config.acquire_timeout()));
        let observers = Arc::new(EventObservers::new());
        let executor = Arc::new(QueryExecutor::new(
            &config,
            pool.clone(),
            health.clone(),
            transport,
            signer,
            observers.clone(),
        ));

        Ok(Self {
            transactions: TransactionCoordinator::new(executor.clone()),
            schema: SchemaOperations::new(executor.clone()),
            config,
            health,
            pool,
            executor,
            observers,
            refresh_task: Mutex::new(None),
        })
    }

    /// Probe every node and fill the pool.
    ///
    /// Fails with a configuration error when no node answers its health check. Calling it
    /// again re-probes and rebuilds the pool.
    pub async fn initialize(&self) -> ClientResult<()> {
        info!(
            "Initializing client for database '{}' over {} node(s)",
            self.config.database_id,
            self.config.nodes.len()
        );
        let healthy = self.health.check_all_nodes().await;
        if healthy == 0 {
            warn!("No node passed its health check");
            return Err(ClientError::Configuration(
                "No healthy nodes available".to_string(),
            ));
        }
        self.pool.initialize(self.config.pool_size, &self.health)?;

        if let Some(secs) = self.config.health_check_interval_secs {
            self.start_health_refresh(Duration::from_secs(secs));
        }

        self.observers.emit(ClientEvent::Connected {
            healthy_nodes: healthy,
            pool_size: self.config.pool_size,
        });
        Ok(())
    }

    fn start_health_refresh(&self, every: Duration) {
        let health = self.health.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick fires immediately and initialize() has just probed
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let healthy = health.check_all_nodes().await;
                debug!("Periodic health check: {} node(s) healthy", healthy);
            }
        });
        let previous = self
            .refresh_task
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stop the background health check and reject queued and future acquisitions
    pub async fn close(&self) {
        if let Some(task) = self
            .refresh_task
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        {
            task.abort();
        }
        self.pool.close();
        info!("Client for database '{}' closed", self.config.database_id);
        self.observers.emit(ClientEvent::Disconnected);
    }

    pub fn is_initialized(&self) -> bool {
        self.pool.is_open()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn query(
        &self,
        sql: &str,
        params: &[Value],
        options: QueryOptions,
    ) -> ClientResult<QueryResult> {
        self.executor.query(sql, params, options).await
    }

    pub async fn query_strong(&self, sql: &str, params: &[Value]) -> ClientResult<QueryResult> {
        self.executor
            .query_strong(sql, params, QueryOptions::new())
            .await
    }

    pub async fn query_eventual(&self, sql: &str, params: &[Value]) -> ClientResult<QueryResult> {
        self.executor
            .query_eventual(sql, params, QueryOptions::new())
            .await
    }

    /// Begin a transaction; the default consistency applies when `consistency` is unset
    pub async fn begin_transaction(
        &self,
        consistency: Option<Consistency>,
    ) -> ClientResult<TransactionHandle> {
        self.transactions
            .begin_transaction(consistency.unwrap_or_else(|| self.executor.default_consistency()))
            .await
    }

    pub async fn create_table(&self, schema: &TableSchema) -> ClientResult<()> {
        self.schema.create_table(schema).await
    }

    pub async fn drop_table(&self, table: &str) -> ClientResult<()> {
        self.schema.drop_table(table).await
    }

    /// Insert rows; writes run strong unless `options` names a consistency
    pub async fn insert(
        &self,
        table: &str,
        rows: &[Row],
        options: QueryOptions,
    ) -> ClientResult<QueryResult> {
        self.schema.insert(table, rows, options).await
    }

    pub async fn insert_one(
        &self,
        table: &str,
        row: Row,
        options: QueryOptions,
    ) -> ClientResult<QueryResult> {
        self.schema.insert_one(table, row, options).await
    }

    pub async fn update(
        &self,
        table: &str,
        values: &Row,
        where_clause: &str,
        where_params: &[Value],
        options: QueryOptions,
    ) -> ClientResult<QueryResult> {
        self.schema
            .update(table, values, where_clause, where_params, options)
            .await
    }

    pub async fn delete(
        &self,
        table: &str,
        where_clause: &str,
        where_params: &[Value],
        options: QueryOptions,
    ) -> ClientResult<QueryResult> {
        self.schema
            .delete(table, where_clause, where_params, options)
            .await
    }

    pub async fn select(&self, table: &str, options: &SelectOptions) -> ClientResult<QueryResult> {
        self.schema.select(table, options).await
    }

    pub async fn count(
        &self,
        table: &str,
        where_clause: Option<&str>,
        params: &[Value],
        options: QueryOptions,
    ) -> ClientResult<u64> {
        self.schema.count(table, where_clause, params, options).await
    }

    pub async fn exists(
        &self,
        table: &str,
        where_clause: Option<&str>,
        params: &[Value],
        options: QueryOptions,
    ) -> ClientResult<bool> {
        self.schema.exists(table, where_clause, params, options).await
    }

    pub fn describe_table(&self, table: &str) -> ClientResult<Option<TableSchema>> {
        self.schema.describe_table(table)
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.schema.list_tables()
    }

    pub fn subscribe(&self, observer: Arc<dyn ClientObserver>) -> ObserverId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn health_snapshot(&self) -> HashMap<String, NodeHealth> {
        self.health.snapshot()
    }

    pub fn healthy_nodes(&self) -> Vec<String> {
        self.health.healthy_nodes()
    }

    /// Re-probe every node now; returns the number of healthy nodes
    pub async fn refresh_health(&self) -> usize {
        self.health.check_all_nodes().await
    }
}

impl Drop for DatabaseClient {
    fn drop(&mut self) {
        if let Some(task) = self
            .refresh_task
            .get_mut()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        {
            task.abort();
        }
    }
}

impl std::fmt::Debug for DatabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseClient")
            .field("config", &self.config)
            .field("pool", &self.pool.stats())
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}
