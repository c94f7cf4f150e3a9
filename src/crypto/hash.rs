//! Cryptographic hashing utilities for the blockchain
//!
//! Provides the SHA-256 based hashing used for block hashes, transaction
//! ids, output ids and merkle tree calculations. Every digest that ends up
//! in a stored field is the lowercase hex encoding of a single SHA-256.

use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest
pub const HASH_HEX_LEN: usize = 64;

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Hashes the concatenation of several string parts
///
/// Parts are joined without separators, so callers are responsible for
/// choosing field orders that cannot collide in practice.
pub fn hash_parts<S: AsRef<str>>(parts: &[S]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_ref().as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Returns the difficulty target prefix, e.g. `"000"` for difficulty 3
pub fn difficulty_target(difficulty: usize) -> String {
    "0".repeat(difficulty)
}

/// Checks if a hex hash meets the difficulty target
/// The hash must start with `difficulty` zero hex characters
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    if difficulty > hash.len() {
        return false;
    }
    hash.bytes().take(difficulty).all(|c| c == b'0')
}
