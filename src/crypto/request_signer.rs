//! Signing of query requests sent to database nodes.
//!
//! A request is authenticated by signing the SHA-256 digest of
//! `database_id + ":" + timestamp + ":" + json_body` with the client's Ed25519 key. Nodes
//! receive the timestamp and the hex signature in headers; the key itself is never sent.

use crate::crypto::ed25519::{ClientKeyPair, PublicKey, SIGNATURE_LENGTH};
use crate::crypto::error::{CryptoError, CryptoResult};
use chrono::Utc;
use sha2::{Digest, Sha256};

/// Timestamp and signature attached to one outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSignature {
    /// Unix epoch milliseconds, as sent in `X-Auth-Timestamp`
    pub timestamp: String,
    /// Lowercase hex Ed25519 signature, as sent in `X-Auth-Signature`
    pub signature: String,
}

/// Signs request bodies for a single database
#[derive(Debug)]
pub struct RequestSigner {
    database_id: String,
    keypair: ClientKeyPair,
}

impl RequestSigner {
    pub fn new(database_id: impl Into<String>, keypair: ClientKeyPair) -> Self {
        Self {
            database_id: database_id.into(),
            keypair,
        }
    }

    /// Create a signer from a hex-encoded secret key
    pub fn from_hex(database_id: impl Into<String>, secret_hex: &str) -> CryptoResult<Self> {
        Ok(Self::new(database_id, ClientKeyPair::from_hex(secret_hex)?))
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    pub fn public_key(&self) -> &PublicKey {
        self.keypair.public_key()
    }

    /// Sign a serialized request body with the current time
    pub fn sign(&self, body: &str) -> RequestSignature {
        let timestamp = Utc::now().timestamp_millis().to_string();
        self.sign_at(&timestamp, body)
    }

    /// Sign a serialized request body with an explicit timestamp
    pub fn sign_at(&self, timestamp: &str, body: &str) -> RequestSignature {
        let digest = signing_digest(&self.database_id, timestamp, body);
        let signature = self.keypair.sign(&digest);
        RequestSignature {
            timestamp: timestamp.to_string(),
            signature: hex::encode(signature),
        }
    }
}

/// Digest that is signed for a request
pub fn signing_digest(database_id: &str, timestamp: &str, body: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(database_id.as_bytes());
    hasher.update(b":");
    hasher.update(timestamp.as_bytes());
    hasher.update(b":");
    hasher.update(body.as_bytes());
    hasher.finalize().into()
}

/// Check a hex signature produced by [`RequestSigner`] against a public key.
///
/// Nodes perform this check; it lives here so tools and tests can validate requests.
pub fn verify_request_signature(
    public_key: &PublicKey,
    database_id: &str,
    timestamp: &str,
    body: &str,
    signature_hex: &str,
) -> CryptoResult<()> {
    let bytes = hex::decode(signature_hex).map_err(|e| CryptoError::InvalidSignature {
        message: e.to_string(),
    })?;
    let signature: [u8; SIGNATURE_LENGTH] =
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidSignature {
                message: format!(
                    "expected {} bytes, got {}",
                    SIGNATURE_LENGTH,
                    bytes.len()
                ),
            })?;
    let digest = signing_digest(database_id, timestamp, body);
    public_key.verify(&digest, &signature)
}
