//! Ed25519 keys used to authenticate requests to database nodes

use crate::crypto::error::{CryptoError, CryptoResult};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::Zeroize;

/// Ed25519 public key length in bytes
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Ed25519 secret key length in bytes
pub const SECRET_KEY_LENGTH: usize = 32;

/// Ed25519 signature length in bytes
pub const SIGNATURE_LENGTH: usize = 64;

/// Public half of a client key, as registered with the database nodes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    inner: VerifyingKey,
}

impl PublicKey {
    /// Create a PublicKey from bytes
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_LENGTH]) -> CryptoResult<Self> {
        // Reject cryptographically weak public keys
        if bytes == &[0u8; PUBLIC_KEY_LENGTH] {
            return Err(CryptoError::InvalidKey {
                message: "All-zeros public key is not allowed".to_string(),
            });
        }

        let verifying_key = VerifyingKey::from_bytes(bytes).map_err(|_| CryptoError::InvalidKey {
            message: "Invalid public key bytes".to_string(),
        })?;
        Ok(Self {
            inner: verifying_key,
        })
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.inner.to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Verify a signature against this public key
    pub fn verify(&self, message: &[u8], signature: &[u8; SIGNATURE_LENGTH]) -> CryptoResult<()> {
        let sig = Signature::from_bytes(signature);
        self.inner.verify(message, &sig)?;
        Ok(())
    }
}

/// Client signing key pair.
///
/// The private half never leaves the process; only signatures derived from it are sent
/// to nodes. The secret bytes are zeroized when the pair is dropped.
pub struct ClientKeyPair {
    signing_key: SigningKey,
    public_key: PublicKey,
}

impl ClientKeyPair {
    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key = PublicKey {
            inner: signing_key.verifying_key(),
        };
        Self {
            signing_key,
            public_key,
        }
    }

    /// Create a key pair from secret key bytes
    pub fn from_secret_bytes(secret_bytes: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(secret_bytes))
    }

    /// Parse a hex-encoded 32-byte secret key, with or without a `0x` prefix
    pub fn from_hex(secret_hex: &str) -> CryptoResult<Self> {
        let trimmed = secret_hex.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let mut bytes = hex::decode(trimmed)?;
        if bytes.len() != SECRET_KEY_LENGTH {
            let length = bytes.len();
            bytes.zeroize();
            return Err(CryptoError::InvalidKey {
                message: format!(
                    "Invalid secret key length: expected {} bytes, got {}",
                    SECRET_KEY_LENGTH, length
                ),
            });
        }
        let mut secret = [0u8; SECRET_KEY_LENGTH];
        secret.copy_from_slice(&bytes);
        bytes.zeroize();
        let pair = Self::from_secret_bytes(&secret);
        secret.zeroize();
        Ok(pair)
    }

    /// Generate a fresh key pair from the operating system RNG
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        Self::from_signing_key(SigningKey::generate(&mut csprng))
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Get the secret key as hex (use with caution)
    pub fn secret_key_hex(&self) -> String {
        let mut bytes = self.signing_key.to_bytes();
        let encoded = hex::encode(bytes);
        bytes.zeroize();
        encoded
    }

    pub fn sign(&self, data: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        self.signing_key.sign(data).to_bytes()
    }

    pub fn verify(&self, data: &[u8], signature: &[u8; SIGNATURE_LENGTH]) -> CryptoResult<()> {
        self.public_key.verify(data, signature)
    }
}

impl std::fmt::Debug for ClientKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientKeyPair")
            .field("public_key", &self.public_key.to_hex())
            .finish_non_exhaustive()
    }
}

impl Drop for ClientKeyPair {
    fn drop(&mut self) {
        // Zeroize the signing key bytes manually since SigningKey doesn't implement Zeroize
        let mut secret_bytes = self.signing_key.to_bytes();
        secret_bytes.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET_HEX: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";

    #[test]
    fn test_from_hex_matches_known_public_key() {
        // RFC 8032 test vector 1
        let keypair = ClientKeyPair::from_hex(SECRET_HEX).expect("valid key");
        assert_eq!(
            keypair.public_key().to_hex(),
            "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a"
        );
    }

    #[test]
    fn test_from_hex_accepts_prefix() {
        let prefixed = format!("0x{}", SECRET_HEX);
        let a = ClientKeyPair::from_hex(&prefixed).expect("valid key");
        let b = ClientKeyPair::from_hex(SECRET_HEX).expect("valid key");
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(ClientKeyPair::from_hex("zz").is_err());
        assert!(ClientKeyPair::from_hex("abcd").is_err());
    }

    #[test]
    fn test_signing_and_verification() {
        let keypair = ClientKeyPair::generate();
        let message = b"db:1700000000000:{}";
        let signature = keypair.sign(message);
        keypair.verify(message, &signature).expect("signature verifies");
        assert!(keypair.verify(b"tampered", &signature).is_err());
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let keypair = ClientKeyPair::from_hex(SECRET_HEX).expect("valid key");
        let rendered = format!("{:?}", keypair);
        assert!(!rendered.contains(SECRET_HEX));
        assert_eq!(keypair.secret_key_hex(), SECRET_HEX);
    }
}
