//! reqwest-backed transport for the node HTTP protocol

use crate::constants::{HEALTH_PATH, QUERY_PATH, USER_AGENT};
use crate::network::protocol::{endpoint, QueryResponse, SignedQueryRequest};
use crate::network::{NodeTransport, TransportError, TransportResult};
use async_trait::async_trait;
use log::debug;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;

/// HTTP transport sharing one connection-reusing reqwest client across all nodes
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> TransportResult<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }

    /// Wrap an existing reqwest client (custom TLS, proxies, ...)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn tag_timeout(error: TransportError, timeout: Duration) -> TransportError {
    match error {
        TransportError::Timeout { .. } => TransportError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        },
        other => other,
    }
}

#[async_trait]
impl NodeTransport for HttpTransport {
    async fn check_health(&self, node: &str, timeout: Duration) -> TransportResult<()> {
        let url = endpoint(node, HEALTH_PATH);
        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| tag_timeout(e.into(), timeout))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(TransportError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn execute(
        &self,
        node: &str,
        request: &SignedQueryRequest,
        timeout: Duration,
    ) -> TransportResult<QueryResponse> {
        let url = endpoint(node, QUERY_PATH);
        let mut builder = self
            .client
            .post(&url)
            .timeout(timeout)
            .header(CONTENT_TYPE, "application/json");
        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }

        debug!("POST {} ({} consistency)", url, request.consistency);
        let response = builder
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| tag_timeout(e.into(), timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| tag_timeout(e.into(), timeout))?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        QueryResponse::parse(&text)
    }
}
