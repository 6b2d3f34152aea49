//! Error types for request signing

use thiserror::Error;

/// Result type alias for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while loading keys or signing requests
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Invalid key material provided
    #[error("Invalid key material: {message}")]
    InvalidKey { message: String },

    /// Invalid signature format
    #[error("Invalid signature format: {message}")]
    InvalidSignature { message: String },

    /// Ed25519 signature verification error
    #[error("Ed25519 signature verification failed")]
    SignatureVerification,
}

impl From<ed25519_dalek::SignatureError> for CryptoError {
    fn from(_err: ed25519_dalek::SignatureError) -> Self {
        CryptoError::SignatureVerification
    }
}

impl From<hex::FromHexError> for CryptoError {
    fn from(err: hex::FromHexError) -> Self {
        CryptoError::InvalidKey {
            message: err.to_string(),
        }
    }
}
