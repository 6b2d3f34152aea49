/// Common constants used across the nodesql client.
///
/// These defaults are used for configuration when explicit values are not provided.
pub const DEFAULT_POOL_SIZE: usize = 10;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_HEALTH_CHECK_TIMEOUT_MS: u64 = 5_000;

/// Upper bound on the pause between two attempts of one statement.
pub const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Longest accepted table, column or index name.
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Node endpoint paths.
pub const HEALTH_PATH: &str = "/v1/health";
pub const QUERY_PATH: &str = "/v1/query";

/// Request headers understood by database nodes.
pub const HEADER_DATABASE_ID: &str = "X-Database-ID";
pub const HEADER_CONSISTENCY: &str = "X-Consistency";
pub const HEADER_AUTH_TIMESTAMP: &str = "X-Auth-Timestamp";
pub const HEADER_AUTH_SIGNATURE: &str = "X-Auth-Signature";
pub const HEADER_TRANSACTION_ID: &str = "X-Transaction-ID";

pub const USER_AGENT: &str = "nodesql/0.1.0";
