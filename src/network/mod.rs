//! Node-facing network layer: wire protocol, transports and health tracking

pub mod error;
pub mod health;
pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod protocol;

use async_trait::async_trait;
use std::time::Duration;

pub use error::{TransportError, TransportResult};
pub use http::HttpTransport;
pub use protocol::{QueryBody, QueryResponse, SignedQueryRequest};

/// The two calls the client makes against a node.
///
/// Implementations perform exactly one network exchange per call and never retry; retry
/// and failover policy belong to the query executor.
#[async_trait]
pub trait NodeTransport: Send + Sync {
    /// Probe `GET /v1/health`; any non-2xx answer is an error
    async fn check_health(&self, node: &str, timeout: Duration) -> TransportResult<()>;

    /// Send one signed statement to `POST /v1/query`
    async fn execute(
        &self,
        node: &str,
        request: &SignedQueryRequest,
        timeout: Duration,
    ) -> TransportResult<QueryResponse>;
}
