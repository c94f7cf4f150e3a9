//! ECDSA key management for the blockchain
//!
//! Provides key pair generation and the signing capability transactions
//! rely on. Transactions sign and verify through [`SignatureProvider`],
//! never through secp256k1 directly.

use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::sha256;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// Signing capability consumed by transactions
///
/// Public keys are passed in their hex encoding, which is how transactions
/// store sender and recipient. Private keys are raw secret bytes.
pub trait SignatureProvider: Send + Sync {
    /// Sign `message` with `private_key`, returning raw signature bytes
    fn sign(&self, message: &[u8], private_key: &[u8]) -> Result<Vec<u8>, KeyError>;

    /// Check `signature` over `message` against `public_key`
    ///
    /// Malformed keys or signatures verify as `false`.
    fn verify(&self, message: &[u8], public_key: &str, signature: &[u8]) -> bool;
}

/// [`SignatureProvider`] backed by secp256k1 ECDSA (same curve as Bitcoin)
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Provider;

impl SignatureProvider for Secp256k1Provider {
    fn sign(&self, message: &[u8], private_key: &[u8]) -> Result<Vec<u8>, KeyError> {
        let secret_key =
            SecretKey::from_slice(private_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        sign_message(&secret_key, message)
    }

    fn verify(&self, message: &[u8], public_key: &str, signature: &[u8]) -> bool {
        let Ok(public_key) = public_key_from_hex(public_key) else {
            return false;
        };
        verify_signature(&public_key, message, signature).unwrap_or(false)
    }
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Raw secret bytes, as handed to a [`SignatureProvider`]
    pub fn private_key_bytes(&self) -> [u8; 32] {
        self.secret_key.secret_bytes()
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the public key as a hex string (compressed format)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Parse a public key from hex string
pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, KeyError> {
    let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPublicKey)?;
    PublicKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPublicKey)
}

/// Sign a message with a secret key
///
/// Messages that are not already 32-byte digests are hashed first.
pub fn sign_message(secret_key: &SecretKey, message: &[u8]) -> Result<Vec<u8>, KeyError> {
    let secp = Secp256k1::new();
    let message = Message::from_digest_slice(&digest_for_signing(message))?;
    let signature = secp.sign_ecdsa(&message, secret_key);
    Ok(signature.serialize_compact().to_vec())
}

/// Verify a signature against a public key
pub fn verify_signature(
    public_key: &PublicKey,
    message: &[u8],
    signature: &[u8],
) -> Result<bool, KeyError> {
    let secp = Secp256k1::new();
    let message = Message::from_digest_slice(&digest_for_signing(message))?;
    let sig = secp256k1::ecdsa::Signature::from_compact(signature)
        .map_err(|_| KeyError::InvalidSignature)?;

    Ok(secp.verify_ecdsa(&message, &sig, public_key).is_ok())
}

fn digest_for_signing(message: &[u8]) -> Vec<u8> {
    if message.len() == 32 {
        message.to_vec()
    } else {
        sha256(message)
    }
}
