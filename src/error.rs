use crate::crypto::error::CryptoError;
use crate::network::TransportError;
use thiserror::Error;

/// Unified error type for the client.
///
/// Each variant maps to one failure category a caller may want to react to differently:
/// configuration and validation errors are caller mistakes and are never retried, pool
/// exhaustion is transient, and `QueryFailed` is the terminal form of a statement whose
/// every attempt failed.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid configuration, or no healthy node at pool initialization
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Rejected identifier or malformed statement input, raised before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    /// No pooled connection became free before the acquisition deadline
    #[error("Connection pool exhausted: no connection released within {waited_ms}ms")]
    PoolExhausted { waited_ms: u64 },

    /// The pool was closed while the caller was waiting, or before it asked
    #[error("Connection pool is closed")]
    PoolClosed,

    /// An operation needing the pool ran before `initialize()`
    #[error("Client is not initialized")]
    NotInitialized,

    /// Every attempt of a statement failed
    #[error("Query failed after {attempts} attempts: {last_error}")]
    QueryFailed {
        attempts: u32,
        #[source]
        last_error: TransportError,
    },

    /// The wire call of a COMMIT or ROLLBACK failed; remote state is indeterminate
    #[error("Transaction {transaction_id} {operation} failed: {source}")]
    Transaction {
        transaction_id: String,
        operation: &'static str,
        #[source]
        source: Box<ClientError>,
    },

    /// Request signing failed
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Errors related to serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A node answered successfully but the result did not have the expected shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Conversion from serde_json::Error to ClientError
impl From<serde_json::Error> for ClientError {
    fn from(error: serde_json::Error) -> Self {
        ClientError::Serialization(error.to_string())
    }
}

impl ClientError {
    /// Whether the caller may reasonably retry the whole operation later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::PoolExhausted { .. } | ClientError::QueryFailed { .. }
        )
    }
}

/// Result type alias for operations that can result in a ClientError
pub type ClientResult<T> = Result<T, ClientError>;
