//! In-memory node transport for tests and examples.
//!
//! Each node can be made unhealthy, made to fail queries, or slowed down. Every call is
//! recorded so tests can assert which node saw which statement.

use crate::network::protocol::{QueryResponse, SignedQueryRequest};
use crate::network::{NodeTransport, TransportError, TransportResult};
use crate::query::types::Consistency;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// A statement as received by a mock node
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedQuery {
    pub node: String,
    pub sql: String,
    pub params: Vec<Value>,
    pub consistency: Consistency,
    pub transaction_id: Option<String>,
    pub database_id: String,
    pub timestamp: String,
    pub signature: String,
    pub body: String,
}

#[derive(Default)]
struct MockState {
    unhealthy: HashSet<String>,
    health_latency: HashMap<String, Duration>,
    failing_nodes: HashSet<String>,
    remaining_failures: HashMap<String, usize>,
    query_delay: Option<Duration>,
    scripted: VecDeque<QueryResponse>,
    default_response: Option<QueryResponse>,
    health_checks: Vec<String>,
    queries: Vec<RecordedQuery>,
}

/// Scriptable [`NodeTransport`]
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the health endpoint of `node` answer with an error (or recover)
    pub fn set_healthy(&self, node: &str, healthy: bool) {
        let mut state = self.state();
        if healthy {
            state.unhealthy.remove(node);
        } else {
            state.unhealthy.insert(node.to_string());
        }
    }

    /// Delay health answers of `node`, which shows up as probe latency
    pub fn set_health_latency(&self, node: &str, latency: Duration) {
        self.state().health_latency.insert(node.to_string(), latency);
    }

    /// Make every query sent to `node` fail until cleared
    pub fn fail_queries(&self, node: &str, failing: bool) {
        let mut state = self.state();
        if failing {
            state.failing_nodes.insert(node.to_string());
        } else {
            state.failing_nodes.remove(node);
        }
    }

    /// Make the next `count` queries sent to `node` fail
    pub fn fail_next_queries(&self, node: &str, count: usize) {
        self.state().remaining_failures.insert(node.to_string(), count);
    }

    /// Delay every query answer
    pub fn set_query_delay(&self, delay: Duration) {
        self.state().query_delay = Some(delay);
    }

    /// Queue a response for the next successful query
    pub fn push_response(&self, response: QueryResponse) {
        self.state().scripted.push_back(response);
    }

    /// Response used when no scripted response is queued
    pub fn set_default_response(&self, response: QueryResponse) {
        self.state().default_response = Some(response);
    }

    pub fn recorded_queries(&self) -> Vec<RecordedQuery> {
        self.state().queries.clone()
    }

    pub fn queries_to(&self, node: &str) -> Vec<RecordedQuery> {
        self.state()
            .queries
            .iter()
            .filter(|q| q.node == node)
            .cloned()
            .collect()
    }

    pub fn health_checks(&self) -> Vec<String> {
        self.state().health_checks.clone()
    }
}

#[async_trait]
impl NodeTransport for MockTransport {
    async fn check_health(&self, node: &str, _timeout: Duration) -> TransportResult<()> {
        let (latency, healthy) = {
            let mut state = self.state();
            state.health_checks.push(node.to_string());
            (
                state.health_latency.get(node).copied(),
                !state.unhealthy.contains(node),
            )
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if healthy {
            Ok(())
        } else {
            Err(TransportError::Status {
                status: 503,
                body: "node unavailable".to_string(),
            })
        }
    }

    async fn execute(
        &self,
        node: &str,
        request: &SignedQueryRequest,
        _timeout: Duration,
    ) -> TransportResult<QueryResponse> {
        let body: Value = serde_json::from_str(&request.body)
            .map_err(|e| TransportError::Request(format!("mock received invalid body: {}", e)))?;
        let recorded = RecordedQuery {
            node: node.to_string(),
            sql: body["sql"].as_str().unwrap_or_default().to_string(),
            params: body["params"].as_array().cloned().unwrap_or_default(),
            consistency: request.consistency,
            transaction_id: request.transaction_id.clone(),
            database_id: request.database_id.clone(),
            timestamp: request.signature.timestamp.clone(),
            signature: request.signature.signature.clone(),
            body: request.body.clone(),
        };

        let delay = {
            let mut state = self.state();
            state.queries.push(recorded);
            state.query_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        let scripted_failure = match state.remaining_failures.get_mut(node) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        };
        if scripted_failure || state.failing_nodes.contains(node) {
            return Err(TransportError::Request(format!("connection refused by {}", node)));
        }
        Ok(state
            .scripted
            .pop_front()
            .or_else(|| state.default_response.clone())
            .unwrap_or_else(QueryResponse::empty))
    }
}
