//! # L2 Core Crypto
//!
//! Cryptographic primitives for the L2 Core ledger.
//!
//! This crate provides:
//! - **Keccak256 digests** - transaction hashing and one-way credential digests
//! - **ECDSA signatures** - secp256k1 signing, verification and recovery
//! - **Encrypted keystores** - Argon2id key derivation with AES-256-GCM
//!
//! ## Example
//!
//! ```rust
//! use l2core_crypto::{ecdsa::PrivateKey, keccak256};
//!
//! let hash = keccak256(b"hello world");
//!
//! let private_key = PrivateKey::random();
//! let public_key = private_key.public_key();
//! let signature = private_key.sign_prehash(&hash).unwrap();
//!
//! assert!(public_key.verify_prehash(&hash, &signature));
//! assert_eq!(public_key.to_account(), private_key.account_id());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod ecdsa;
pub mod hash;
pub mod keystore;

// Re-export commonly used items
pub use ecdsa::{PrivateKey, PublicKey};
pub use hash::{digest_eq, keccak256, keccak256_concat, secret_digest};
pub use keystore::{KdfParams, Keystore};

/// Error types for cryptographic operations
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Invalid private key bytes
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Invalid public key bytes
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Invalid signature bytes
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Failed to recover public key from signature
    #[error("failed to recover public key: {0}")]
    RecoveryFailed(String),

    /// Invalid input length
    #[error("invalid input length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Hex decoding error
    #[error("hex decoding error: {0}")]
    HexError(String),

    /// Key derivation or cipher failure
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Wrong passphrase or tampered keystore
    #[error("keystore authentication failed")]
    Authentication,

    /// Malformed or unsupported keystore file
    #[error("invalid keystore: {0}")]
    InvalidKeystore(String),

    /// Keystore file I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<hex::FromHexError> for CryptoError {
    fn from(e: hex::FromHexError) -> Self {
        CryptoError::HexError(e.to_string())
    }
}

impl From<argon2::Error> for CryptoError {
    fn from(e: argon2::Error) -> Self {
        CryptoError::Encryption(e.to_string())
    }
}

impl From<serde_json::Error> for CryptoError {
    fn from(e: serde_json::Error) -> Self {
        CryptoError::InvalidKeystore(e.to_string())
    }
}

/// Result type for cryptographic operations
pub type Result<T> = std::result::Result<T, CryptoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_basic() {
        let hash = keccak256(b"hello");
        assert_eq!(
            hash.to_hex(),
            "0x1c8aff950685c2ed4bc3174f3472287b56d9517b9c948127319a09a7a36deac8"
        );
    }

    #[test]
    fn test_ecdsa_sign_verify() {
        let private_key = ecdsa::PrivateKey::random();
        let public_key = private_key.public_key();
        let hash = keccak256(b"test message");

        let signature = private_key.sign_prehash(&hash).unwrap();
        assert!(public_key.verify_prehash(&hash, &signature));
        assert!(!public_key.verify_prehash(&keccak256(b"other"), &signature));
    }
}
