use crate::constants::{
    DEFAULT_ACQUIRE_TIMEOUT_MS, DEFAULT_HEALTH_CHECK_TIMEOUT_MS, DEFAULT_POOL_SIZE,
    DEFAULT_QUERY_TIMEOUT_MS, DEFAULT_RETRY_ATTEMPTS,
};
use crate::crypto::ClientKeyPair;
use crate::error::{ClientError, ClientResult};
use crate::query::types::Consistency;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Configuration for a [`DatabaseClient`](crate::DatabaseClient).
///
/// Loaded from TOML or built in code:
///
/// ```toml
/// nodes = ["https://db-1.example.net", "https://db-2.example.net"]
/// database_id = "orders"
/// private_key = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60"
/// pool_size = 8
/// default_consistency = "eventual"
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URLs of the database nodes; the first one is the fallback node
    pub nodes: Vec<String>,
    /// Value of the `X-Database-ID` header
    pub database_id: String,
    /// Hex-encoded 32-byte Ed25519 secret key used to sign requests
    pub private_key: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Attempts per statement, including the first one
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Base delay before a retry, doubled each time; 0 retries immediately
    #[serde(default)]
    pub retry_delay_ms: u64,
    /// Bound on a single attempt
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    /// How long `acquire()` waits for a connection when the pool is exhausted
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    /// Bound on a single health probe
    #[serde(default = "default_health_check_timeout_ms")]
    pub health_check_timeout_ms: u64,
    /// Re-probe every node on this interval after initialization (off when unset)
    #[serde(default)]
    pub health_check_interval_secs: Option<u64>,
    #[serde(default)]
    pub default_consistency: Consistency,
    /// Log statement text at debug level
    #[serde(default)]
    pub log_queries: bool,
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

fn default_retry_attempts() -> u32 {
    DEFAULT_RETRY_ATTEMPTS
}

fn default_query_timeout_ms() -> u64 {
    DEFAULT_QUERY_TIMEOUT_MS
}

fn default_acquire_timeout_ms() -> u64 {
    DEFAULT_ACQUIRE_TIMEOUT_MS
}

fn default_health_check_timeout_ms() -> u64 {
    DEFAULT_HEALTH_CHECK_TIMEOUT_MS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            database_id: String::new(),
            private_key: String::new(),
            pool_size: default_pool_size(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: 0,
            query_timeout_ms: default_query_timeout_ms(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            health_check_timeout_ms: default_health_check_timeout_ms(),
            health_check_interval_secs: None,
            default_consistency: Consistency::default(),
            log_queries: false,
        }
    }
}

// The private key stays out of logs
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("nodes", &self.nodes)
            .field("database_id", &self.database_id)
            .field("private_key", &"<redacted>")
            .field("pool_size", &self.pool_size)
            .field("retry_attempts", &self.retry_attempts)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("query_timeout_ms", &self.query_timeout_ms)
            .field("acquire_timeout_ms", &self.acquire_timeout_ms)
            .field("health_check_timeout_ms", &self.health_check_timeout_ms)
            .field("health_check_interval_secs", &self.health_check_interval_secs)
            .field("default_consistency", &self.default_consistency)
            .field("log_queries", &self.log_queries)
            .finish()
    }
}

impl ClientConfig {
    /// Create a configuration with defaults for everything but the essentials
    pub fn new(nodes: Vec<String>, database_id: &str, private_key: &str) -> Self {
        Self {
            nodes,
            database_id: database_id.to_string(),
            private_key: private_key.to_string(),
            ..Default::default()
        }
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> ClientResult<Self> {
        toml::from_str(content)
            .map_err(|e| ClientError::Configuration(format!("Invalid TOML configuration: {}", e)))
    }

    /// Load a TOML configuration file
    pub fn from_toml_file(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ClientError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    pub fn with_retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.retry_delay_ms = delay_ms;
        self
    }

    pub fn with_query_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.query_timeout_ms = timeout_ms;
        self
    }

    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    pub fn with_health_check_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.health_check_timeout_ms = timeout_ms;
        self
    }

    pub fn with_health_check_interval_secs(mut self, interval_secs: u64) -> Self {
        self.health_check_interval_secs = Some(interval_secs);
        self
    }

    pub fn with_default_consistency(mut self, consistency: Consistency) -> Self {
        self.default_consistency = consistency;
        self
    }

    pub fn with_log_queries(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_millis(self.health_check_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Validate the configuration, including the signing key
    pub fn validate(&self) -> ClientResult<()> {
        if self.nodes.is_empty() {
            return Err(ClientError::Configuration(
                "At least one node must be configured".to_string(),
            ));
        }
        for node in &self.nodes {
            let url = reqwest::Url::parse(node).map_err(|e| {
                ClientError::Configuration(format!("Invalid node URL '{}': {}", node, e))
            })?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ClientError::Configuration(format!(
                    "Node URL '{}' must use http or https",
                    node
                )));
            }
        }
        if self.database_id.trim().is_empty() {
            return Err(ClientError::Configuration(
                "database_id must not be empty".to_string(),
            ));
        }
        if self.pool_size == 0 {
            return Err(ClientError::Configuration(
                "pool_size must be at least 1".to_string(),
            ));
        }
        if self.retry_attempts == 0 {
            return Err(ClientError::Configuration(
                "retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.query_timeout_ms == 0 || self.acquire_timeout_ms == 0 || self.health_check_timeout_ms == 0 {
            return Err(ClientError::Configuration(
                "Timeouts must be greater than zero".to_string(),
            ));
        }
        if self.health_check_interval_secs == Some(0) {
            return Err(ClientError::Configuration(
                "health_check_interval_secs must be greater than zero".to_string(),
            ));
        }
        ClientKeyPair::from_hex(&self.private_key)
            .map_err(|e| ClientError::Configuration(format!("Invalid private_key: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const KEY: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";

    fn valid() -> ClientConfig {
        ClientConfig::new(vec!["http://n1:4661".to_string()], "orders", KEY)
    }

    #[test]
    fn test_defaults() {
        let config = valid();
        assert_eq!(config.pool_size, 10);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.acquire_timeout(), Duration::from_secs(10));
        assert_eq!(config.health_check_timeout(), Duration::from_secs(5));
        assert_eq!(config.query_timeout(), Duration::from_secs(30));
        assert_eq!(config.default_consistency, Consistency::Strong);
        assert!(config.health_check_interval_secs.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_validation_failures() {
        let cases = vec![
            ClientConfig { nodes: vec![], ..valid() },
            ClientConfig { nodes: vec!["not a url".to_string()], ..valid() },
            ClientConfig { nodes: vec!["ftp://n1".to_string()], ..valid() },
            ClientConfig { database_id: " ".to_string(), ..valid() },
            valid().with_pool_size(0),
            valid().with_retry_attempts(0),
            valid().with_acquire_timeout_ms(0),
            valid().with_health_check_interval_secs(0),
            ClientConfig { private_key: "deadbeef".to_string(), ..valid() },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(ClientError::Configuration(_))),
                "expected rejection for {:?}",
                config
            );
        }
    }

    #[test]
    fn test_from_toml_applies_defaults() {
        let config = ClientConfig::from_toml_str(&format!(
            r#"
            nodes = ["http://n1", "http://n2"]
            database_id = "orders"
            private_key = "{}"
            pool_size = 4
            default_consistency = "eventual"
            "#,
            KEY
        ))
        .unwrap();
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.default_consistency, Consistency::Eventual);
        config.validate().unwrap();
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "nodes = [\"http://n1\"]\ndatabase_id = \"db\"\nprivate_key = \"{}\"\nlog_queries = true",
            KEY
        )
        .unwrap();
        let config = ClientConfig::from_toml_file(file.path()).unwrap();
        assert!(config.log_queries);
        assert!(ClientConfig::from_toml_file("/nonexistent/nodesql.toml").is_err());
        assert!(ClientConfig::from_toml_str("nodes = 3").is_err());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let rendered = format!("{:?}", valid());
        assert!(!rendered.contains(KEY));
        assert!(rendered.contains("<redacted>"));
    }
}
