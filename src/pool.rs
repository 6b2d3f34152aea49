//! Fixed-size pool of logical connections with FIFO acquisition.
//!
//! A connection is a slot bound to one node, not a socket. Acquisition never suspends
//! while a slot is free. When every slot is taken the caller joins a wait-queue and is
//! served by the next release in strict arrival order, or rejected once its deadline
//! passes. All bookkeeping happens under one short-lived lock that is never held across an
//! `.await`, and a slot is marked in use before its new holder is woken.

use crate::error::{ClientError, ClientResult};
use crate::network::health::NodeHealthMonitor;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// One logical connection slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PooledConnection {
    pub id: String,
    pub bound_node: String,
    pub in_use: bool,
    pub last_used_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Snapshot of pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub size: usize,
    pub in_use: usize,
    pub idle: usize,
    pub waiting: usize,
}

/// A caller suspended in `acquire()`
struct AcquireRequest {
    id: u64,
    grant: oneshot::Sender<usize>,
    enqueued_at: Instant,
    deadline: Instant,
}

#[derive(Default)]
struct PoolState {
    connections: Vec<PooledConnection>,
    waiters: VecDeque<AcquireRequest>,
    next_request_id: u64,
    open: bool,
}

impl PoolState {
    fn claim_idle(&mut self) -> Option<usize> {
        let slot = self.connections.iter().position(|c| !c.in_use)?;
        let connection = &mut self.connections[slot];
        connection.in_use = true;
        connection.last_used_at = Utc::now();
        Some(slot)
    }

    fn remove_waiter(&mut self, request_id: u64) -> bool {
        match self.waiters.iter().position(|w| w.id == request_id) {
            Some(index) => {
                self.waiters.remove(index);
                true
            }
            None => false,
        }
    }

    /// Hand a freed slot to the oldest live waiter, or park it as idle.
    ///
    /// Expired waiters and waiters whose caller has gone away are dropped on the way; the
    /// slot is marked in use before the grant is sent.
    fn hand_off(&mut self, slot: usize) {
        let now = Instant::now();
        while let Some(waiter) = self.waiters.pop_front() {
            if waiter.deadline <= now {
                debug!("Dropping expired acquire request {}", waiter.id);
                continue;
            }
            let connection = &mut self.connections[slot];
            connection.in_use = true;
            connection.last_used_at = Utc::now();
            if waiter.grant.send(slot).is_ok() {
                debug!(
                    "Granted {} to request {} after {}ms",
                    connection.id,
                    waiter.id,
                    waiter.enqueued_at.elapsed().as_millis()
                );
                return;
            }
        }
        let connection = &mut self.connections[slot];
        connection.in_use = false;
        connection.last_used_at = Utc::now();
    }
}

/// Bounded connection pool shared by every statement of one client
pub struct ConnectionPool {
    acquire_timeout: Duration,
    state: Mutex<PoolState>,
}

impl ConnectionPool {
    pub fn new(acquire_timeout: Duration) -> Self {
        Self {
            acquire_timeout,
            state: Mutex::new(PoolState::default()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create `pool_size` connections bound to the best healthy node.
    ///
    /// Fails when no node is healthy, or when connections of a previous initialization are
    /// still checked out.
    pub fn initialize(&self, pool_size: usize, health: &NodeHealthMonitor) -> ClientResult<()> {
        if pool_size == 0 {
            return Err(ClientError::Configuration(
                "Pool size must be at least 1".to_string(),
            ));
        }
        if health.healthy_nodes().is_empty() {
            return Err(ClientError::Configuration(
                "No healthy nodes available".to_string(),
            ));
        }
        let node = health.get_healthy_node();

        let mut state = self.lock_state();
        if state.connections.iter().any(|c| c.in_use) {
            return Err(ClientError::Configuration(
                "Cannot re-initialize the pool while connections are checked out".to_string(),
            ));
        }
        let now = Utc::now();
        state.connections = (0..pool_size)
            .map(|i| PooledConnection {
                id: format!("conn-{}", i),
                bound_node: node.clone(),
                in_use: false,
                last_used_at: now,
                created_at: now,
            })
            .collect();
        state.waiters.clear();
        state.open = true;
        info!("Connection pool initialized: {} connections bound to {}", pool_size, node);
        Ok(())
    }

    /// Check out a connection, waiting in FIFO order if all are in use
    pub async fn acquire(&self) -> ClientResult<ConnectionLease<'_>> {
        let (request_id, receiver) = {
            let mut state = self.lock_state();
            if !state.open {
                return Err(if state.connections.is_empty() {
                    ClientError::NotInitialized
                } else {
                    ClientError::PoolClosed
                });
            }
            if let Some(slot) = state.claim_idle() {
                return Ok(self.lease(&state, slot));
            }

            let (grant, receiver) = oneshot::channel();
            let now = Instant::now();
            let request_id = state.next_request_id;
            state.next_request_id += 1;
            state.waiters.push_back(AcquireRequest {
                id: request_id,
                grant,
                enqueued_at: now,
                deadline: now + self.acquire_timeout,
            });
            debug!(
                "Pool exhausted, request {} queued behind {} others",
                request_id,
                state.waiters.len() - 1
            );
            (request_id, receiver)
        };

        let mut pending = PendingAcquire {
            pool: self,
            request_id,
            receiver: Some(receiver),
        };
        pending.wait(self.acquire_timeout).await
    }

    /// Return a connection to the pool; equivalent to dropping the lease
    pub fn release(&self, lease: ConnectionLease<'_>) {
        drop(lease);
    }

    fn release_slot(&self, slot: usize) {
        let mut state = self.lock_state();
        if slot < state.connections.len() {
            state.hand_off(slot);
        }
    }

    fn rebind_slot(&self, slot: usize, node: &str) {
        let mut state = self.lock_state();
        if let Some(connection) = state.connections.get_mut(slot) {
            if connection.bound_node != node {
                info!(
                    "Rebinding {} from {} to {}",
                    connection.id, connection.bound_node, node
                );
                connection.bound_node = node.to_string();
            }
        }
    }

    fn lease(&self, state: &PoolState, slot: usize) -> ConnectionLease<'_> {
        let connection = &state.connections[slot];
        ConnectionLease {
            pool: self,
            slot,
            id: connection.id.clone(),
            node: connection.bound_node.clone(),
        }
    }

    /// Reject every queued waiter and refuse further acquisition.
    ///
    /// Leases still held stay valid until dropped.
    pub fn close(&self) {
        let mut state = self.lock_state();
        state.open = false;
        let rejected = state.waiters.len();
        // Dropping the senders wakes every waiter with PoolClosed
        state.waiters.clear();
        if rejected > 0 {
            warn!("Pool closed with {} queued acquire requests", rejected);
        }
    }

    pub fn is_open(&self) -> bool {
        self.lock_state().open
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.lock_state();
        let in_use = state.connections.iter().filter(|c| c.in_use).count();
        PoolStats {
            size: state.connections.len(),
            in_use,
            idle: state.connections.len() - in_use,
            waiting: state.waiters.len(),
        }
    }

    pub fn connections(&self) -> Vec<PooledConnection> {
        self.lock_state().connections.clone()
    }
}

/// A queued acquisition; removes itself from the queue if the caller stops waiting
struct PendingAcquire<'a> {
    pool: &'a ConnectionPool,
    request_id: u64,
    receiver: Option<oneshot::Receiver<usize>>,
}

impl<'a> PendingAcquire<'a> {
    async fn wait(&mut self, timeout: Duration) -> ClientResult<ConnectionLease<'a>> {
        let outcome = match self.receiver.as_mut() {
            Some(receiver) => tokio::time::timeout(timeout, receiver).await,
            None => return Err(ClientError::PoolClosed),
        };

        match outcome {
            Ok(Ok(slot)) => {
                self.receiver = None;
                Ok(self.lease_granted(slot))
            }
            Ok(Err(_)) => {
                // Sender dropped without a grant: pool closed, or request expired
                self.receiver = None;
                if self.pool.is_open() {
                    Err(self.exhausted(timeout))
                } else {
                    Err(ClientError::PoolClosed)
                }
            }
            Err(_) => {
                let removed = self.pool.lock_state().remove_waiter(self.request_id);
                let receiver = self.receiver.take();
                if removed {
                    return Err(self.exhausted(timeout));
                }
                // A release won the race with the timer and already granted a slot
                match receiver.map(|mut r| r.try_recv()) {
                    Some(Ok(slot)) => Ok(self.lease_granted(slot)),
                    _ => Err(self.exhausted(timeout)),
                }
            }
        }
    }

    fn lease_granted(&self, slot: usize) -> ConnectionLease<'a> {
        let state = self.pool.lock_state();
        self.pool.lease(&state, slot)
    }

    fn exhausted(&self, timeout: Duration) -> ClientError {
        warn!(
            "Acquire request {} timed out after {}ms",
            self.request_id,
            timeout.as_millis()
        );
        ClientError::PoolExhausted {
            waited_ms: timeout.as_millis() as u64,
        }
    }
}

impl Drop for PendingAcquire<'_> {
    fn drop(&mut self) {
        let Some(mut receiver) = self.receiver.take() else {
            return;
        };
        let removed = self.pool.lock_state().remove_waiter(self.request_id);
        if !removed {
            if let Ok(slot) = receiver.try_recv() {
                self.pool.release_slot(slot);
            }
        }
    }
}

/// Exclusive hold on one pooled connection; released on drop
#[derive(Debug)]
pub struct ConnectionLease<'a> {
    pool: &'a ConnectionPool,
    slot: usize,
    id: String,
    node: String,
}

impl ConnectionLease<'_> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Node this connection currently sends statements to
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Point this connection at another node; the slot keeps its identity
    pub fn rebind(&mut self, node: &str) {
        self.pool.rebind_slot(self.slot, node);
        self.node = node.to_string();
    }
}

impl Drop for ConnectionLease<'_> {
    fn drop(&mut self) {
        self.pool.release_slot(self.slot);
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("acquire_timeout", &self.acquire_timeout)
            .field("stats", &self.stats())
            .finish()
    }
}
