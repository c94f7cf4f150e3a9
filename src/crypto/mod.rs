//! Cryptographic utilities for the blockchain
//!
//! This module provides:
//! - SHA-256 hashing and difficulty checks
//! - ECDSA key management and the signing capability (secp256k1)
//! - Merkle root calculation

pub mod hash;
pub mod keys;
pub mod merkle;

pub use hash::{difficulty_target, hash_parts, meets_difficulty, sha256, sha256_hex, HASH_HEX_LEN};
pub use keys::{
    public_key_from_hex, sign_message, verify_signature, KeyError, KeyPair, Secp256k1Provider,
    SignatureProvider,
};
pub use merkle::calculate_merkle_root;
