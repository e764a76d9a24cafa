//! # Keccak256 Digests
//!
//! Thin wrappers over [`H256`] hashing plus the one-way digest used to retain
//! issued node secrets without storing them.
//!
//! ```rust
//! use l2core_crypto::{digest_eq, secret_digest};
//!
//! let stored = secret_digest(b"api key");
//! assert!(digest_eq(&stored, &secret_digest(b"api key")));
//! assert!(!digest_eq(&stored, &secret_digest(b"guess")));
//! ```

use l2core_types::H256;
use subtle::ConstantTimeEq;

/// Domain tag for secret digests, keeps them apart from transaction hashes.
const SECRET_DIGEST_TAG: &[u8] = b"l2core/secret/v1";

/// Compute the Keccak256 hash of the input data.
#[inline]
pub fn keccak256(data: &[u8]) -> H256 {
    H256::keccak256(data)
}

/// Compute the Keccak256 hash of multiple concatenated inputs.
#[inline]
pub fn keccak256_concat(parts: &[&[u8]]) -> H256 {
    H256::keccak256_concat(parts)
}

/// One-way digest of a secret. Only this value is ever retained.
pub fn secret_digest(secret: &[u8]) -> H256 {
    H256::keccak256_concat(&[SECRET_DIGEST_TAG, secret])
}

/// Constant-time digest comparison.
pub fn digest_eq(a: &H256, b: &H256) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
