//! Best-effort view of which nodes are reachable and how fast they answer

use crate::error::{ClientError, ClientResult};
use crate::network::{NodeTransport, TransportError};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// Last known state of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHealth {
    pub healthy: bool,
    pub last_check: DateTime<Utc>,
    pub latency_ms: u64,
}

/// Tracks health of the configured nodes.
///
/// Nodes that have never been probed count as unhealthy. The monitor never issues
/// queries; it only probes health endpoints and records outcomes reported to it.
pub struct NodeHealthMonitor {
    nodes: Vec<String>,
    probe_timeout: Duration,
    transport: Arc<dyn NodeTransport>,
    health: RwLock<HashMap<String, NodeHealth>>,
}

impl NodeHealthMonitor {
    pub fn new(
        nodes: Vec<String>,
        probe_timeout: Duration,
        transport: Arc<dyn NodeTransport>,
    ) -> ClientResult<Self> {
        if nodes.is_empty() {
            return Err(ClientError::Configuration(
                "At least one node must be configured".to_string(),
            ));
        }
        Ok(Self {
            nodes,
            probe_timeout,
            transport,
            health: RwLock::new(HashMap::new()),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, NodeHealth>> {
        self.health.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, NodeHealth>> {
        self.health.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Configured nodes, in configuration order
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Probe every node concurrently; returns the number of healthy nodes.
    ///
    /// Each probe is bounded by the probe timeout and recorded on its own, so a slow or
    /// failing node never delays or fails the others.
    pub async fn check_all_nodes(&self) -> usize {
        let probes = self.nodes.iter().map(|node| self.probe(node));
        let results = join_all(probes).await;

        let checked_at = Utc::now();
        let mut health = self.write();
        for (node, healthy, latency_ms) in &results {
            health.insert(
                node.clone(),
                NodeHealth {
                    healthy: *healthy,
                    last_check: checked_at,
                    latency_ms: *latency_ms,
                },
            );
        }
        let healthy_count = results.iter().filter(|(_, healthy, _)| *healthy).count();
        info!(
            "Health check complete: {}/{} nodes healthy",
            healthy_count,
            self.nodes.len()
        );
        healthy_count
    }

    async fn probe(&self, node: &str) -> (String, bool, u64) {
        let started = Instant::now();
        let outcome = tokio::time::timeout(
            self.probe_timeout,
            self.transport.check_health(node, self.probe_timeout),
        )
        .await
        .unwrap_or(Err(TransportError::Timeout {
            timeout_ms: self.probe_timeout.as_millis() as u64,
        }));
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => {
                debug!("Node {} healthy ({}ms)", node, latency_ms);
                (node.to_string(), true, latency_ms)
            }
            Err(e) => {
                warn!("Node {} failed health check: {}", node, e);
                (node.to_string(), false, latency_ms)
            }
        }
    }

    /// Healthy node with the lowest latency, or the first configured node if none is
    /// healthy. Ties resolve to configuration order.
    pub fn get_healthy_node(&self) -> String {
        let health = self.read();
        self.nodes
            .iter()
            .filter_map(|node| {
                health
                    .get(node)
                    .filter(|h| h.healthy)
                    .map(|h| (node, h.latency_ms))
            })
            .min_by_key(|(_, latency)| *latency)
            .map(|(node, _)| node.clone())
            .unwrap_or_else(|| self.nodes[0].clone())
    }

    /// Record a failed attempt against `node`
    pub fn mark_unhealthy(&self, node: &str) {
        let mut health = self.write();
        health.insert(
            node.to_string(),
            NodeHealth {
                healthy: false,
                last_check: Utc::now(),
                latency_ms: 0,
            },
        );
    }

    pub fn is_healthy(&self, node: &str) -> bool {
        self.read().get(node).is_some_and(|h| h.healthy)
    }

    /// Healthy nodes in configuration order
    pub fn healthy_nodes(&self) -> Vec<String> {
        let health = self.read();
        self.nodes
            .iter()
            .filter(|node| health.get(*node).is_some_and(|h| h.healthy))
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> HashMap<String, NodeHealth> {
        self.read().clone()
    }
}
