//! Cryptographic primitives used to authenticate requests to database nodes

pub mod ed25519;
pub mod error;
pub mod request_signer;

pub use ed25519::{ClientKeyPair, PublicKey};
pub use error::{CryptoError, CryptoResult};
pub use request_signer::{verify_request_signature, RequestSignature, RequestSigner};
