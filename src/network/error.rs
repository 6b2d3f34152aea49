use thiserror::Error;

/// Result type for a single call to a node
pub type TransportResult<T> = Result<T, TransportError>;

/// Failure of one attempt against one node.
///
/// These never reach callers of `query()` individually; the executor absorbs them into its
/// retry loop and reports only the last one inside `ClientError::QueryFailed`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Node responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not report the configured duration; callers re-tag with it
            TransportError::Timeout { timeout_ms: 0 }
        } else if let Some(status) = err.status() {
            TransportError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            TransportError::Request(err.to_string())
        }
    }
}
