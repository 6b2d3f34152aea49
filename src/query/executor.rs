//! Statement execution with bounded retry and node failover

use crate::config::ClientConfig;
use crate::constants::MAX_RETRY_DELAY_MS;
use crate::crypto::RequestSigner;
use crate::error::{ClientError, ClientResult};
use crate::events::{ClientEvent, EventObservers};
use crate::network::health::NodeHealthMonitor;
use crate::network::protocol::{QueryBody, SignedQueryRequest};
use crate::network::{NodeTransport, TransportError};
use crate::pool::ConnectionPool;
use crate::query::types::{Consistency, QueryOptions, QueryResult};
use log::{debug, error, warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Pause before `attempt` (2 or later): the base delay doubled per earlier retry, capped
/// at [`MAX_RETRY_DELAY_MS`].
pub(crate) fn retry_backoff(base: Duration, attempt: u32) -> Duration {
    let max = Duration::from_millis(MAX_RETRY_DELAY_MS);
    2u32.checked_pow(attempt.saturating_sub(2))
        .and_then(|factor| base.checked_mul(factor))
        .map_or(max, |delay| delay.min(max))
}

/// Executes single statements against the pool.
///
/// Each attempt checks out a connection, signs the statement for that attempt and sends it
/// to the connection's node. A failed attempt demotes the node, rebinds the connection to
/// the best remaining node and tries again, up to `retry_attempts` attempts in total.
///
/// Statements are re-sent as-is on retry. A non-idempotent statement whose first attempt
/// reached the node but whose answer was lost may therefore be applied twice.
pub struct QueryExecutor {
    pool: Arc<ConnectionPool>,
    health: Arc<NodeHealthMonitor>,
    transport: Arc<dyn NodeTransport>,
    signer: RequestSigner,
    observers: Arc<EventObservers>,
    default_consistency: Consistency,
    query_timeout: Duration,
    retry_attempts: u32,
    retry_delay: Duration,
    log_queries: bool,
}

impl QueryExecutor {
    pub fn new(
        config: &ClientConfig,
        pool: Arc<ConnectionPool>,
        health: Arc<NodeHealthMonitor>,
        transport: Arc<dyn NodeTransport>,
        signer: RequestSigner,
        observers: Arc<EventObservers>,
    ) -> Self {
        Self {
            pool,
            health,
            transport,
            signer,
            observers,
            default_consistency: config.default_consistency,
            query_timeout: config.query_timeout(),
            retry_attempts: config.retry_attempts.max(1),
            retry_delay: config.retry_delay(),
            log_queries: config.log_queries,
        }
    }

    pub fn default_consistency(&self) -> Consistency {
        self.default_consistency
    }

    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    /// Execute one statement with the given options
    pub async fn query(
        &self,
        sql: &str,
        params: &[Value],
        options: QueryOptions,
    ) -> ClientResult<QueryResult> {
        let consistency = options.consistency.unwrap_or(self.default_consistency);
        let timeout = options
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.query_timeout);
        let body = serde_json::to_string(&QueryBody { sql, params })?;

        if self.log_queries {
            debug!("[{}] {} ({} params)", consistency, sql, params.len());
        }

        let mut last_error = None;
        for attempt in 1..=self.retry_attempts {
            if attempt > 1 && !self.retry_delay.is_zero() {
                tokio::time::sleep(retry_backoff(self.retry_delay, attempt)).await;
            }

            let mut lease = self.pool.acquire().await?;
            if !self.health.is_healthy(lease.node()) {
                let preferred = self.health.get_healthy_node();
                if preferred != lease.node() {
                    lease.rebind(&preferred);
                }
            }
            let node = lease.node().to_string();

            let request = SignedQueryRequest {
                database_id: self.signer.database_id().to_string(),
                consistency,
                transaction_id: options.transaction_id.clone(),
                signature: self.signer.sign(&body),
                body: body.clone(),
            };

            let started = Instant::now();
            let outcome = tokio::time::timeout(timeout, self.transport.execute(&node, &request, timeout))
                .await
                .unwrap_or(Err(TransportError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                }));

            match outcome {
                Ok(response) => {
                    drop(lease);
                    let duration_ms = started.elapsed().as_millis() as u64;
                    debug!(
                        "Statement served by {} in {}ms (attempt {}/{})",
                        node, duration_ms, attempt, self.retry_attempts
                    );
                    return Ok(QueryResult::from_response(response, duration_ms, node));
                }
                Err(e) => {
                    warn!(
                        "Attempt {}/{} against {} failed: {}",
                        attempt, self.retry_attempts, node, e
                    );
                    self.health.mark_unhealthy(&node);
                    let replacement = self.health.get_healthy_node();
                    lease.rebind(&replacement);
                    drop(lease);

                    self.observers.emit(ClientEvent::NodeUnhealthy {
                        node,
                        attempt,
                        reason: e.to_string(),
                    });
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error
            .unwrap_or_else(|| TransportError::Request("no attempt was made".to_string()));
        error!(
            "Query failed after {} attempts: {}",
            self.retry_attempts, last_error
        );
        Err(ClientError::QueryFailed {
            attempts: self.retry_attempts,
            last_error,
        })
    }

    /// Execute with strong consistency regardless of options
    pub async fn query_strong(
        &self,
        sql: &str,
        params: &[Value],
        options: QueryOptions,
    ) -> ClientResult<QueryResult> {
        self.query(sql, params, options.with_consistency(Consistency::Strong))
            .await
    }

    /// Execute with eventual consistency regardless of options
    pub async fn query_eventual(
        &self,
        sql: &str,
        params: &[Value],
        options: QueryOptions,
    ) -> ClientResult<QueryResult> {
        self.query(sql, params, options.with_consistency(Consistency::Eventual))
            .await
    }

    pub(crate) fn observers(&self) -> &EventObservers {
        &self.observers
    }
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("database_id", &self.signer.database_id())
            .field("default_consistency", &self.default_consistency)
            .field("retry_attempts", &self.retry_attempts)
            .finish_non_exhaustive()
    }
}
