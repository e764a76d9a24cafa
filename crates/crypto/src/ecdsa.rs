//! # ECDSA Signatures using secp256k1
//!
//! Key handling for wallets and validator nodes. Signatures are the 65-byte
//! recoverable [`Signature`] from `l2core-types`, so anything signed here can
//! be checked by recovering the signer's [`AccountId`].
//!
//! ## Key Types
//!
//! - `PrivateKey` - 32-byte secret key for signing
//! - `PublicKey` - compressed (33 bytes) or uncompressed (64 bytes) public key
//!
//! ## Example
//!
//! ```rust
//! use l2core_crypto::ecdsa::PrivateKey;
//! use l2core_types::{AccountId, Transaction};
//!
//! let key = PrivateKey::random();
//! let tx = Transaction::transfer(key.account_id(), AccountId::new([2; 20]), 40, 1);
//! let signed = key.sign_transaction(tx).unwrap();
//! assert!(signed.verify());
//! ```

use crate::{CryptoError, Result};
use k256::{
    ecdsa::{signature::hazmat::PrehashVerifier, Signature as K256Signature, SigningKey, VerifyingKey},
    elliptic_curve::sec1::ToEncodedPoint,
    SecretKey,
};
use l2core_types::{AccountId, Signature, SignedTransaction, Transaction, H256};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// ECDSA private key (32 bytes)
#[derive(Clone)]
pub struct PrivateKey {
    inner: SigningKey,
}

impl PrivateKey {
    /// Generate a random private key from the operating system RNG.
    pub fn random() -> Self {
        let secret_key = SecretKey::random(&mut OsRng);
        Self {
            inner: SigningKey::from(secret_key),
        }
    }

    /// Create a private key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are zero or exceed the curve order.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let secret_key = SecretKey::from_bytes(bytes.into())
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self {
            inner: SigningKey::from(secret_key),
        })
    }

    /// Create a private key from a hex string, with or without 0x prefix.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let bytes = Zeroizing::new(hex::decode(hex)?);
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = Zeroizing::new([0u8; 32]);
        arr.copy_from_slice(&bytes);
        Self::from_bytes(&arr)
    }

    /// Get the raw bytes of the private key.
    ///
    /// The returned buffer is wiped when dropped.
    pub fn to_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.inner.to_bytes().into())
    }

    /// Get the hex-encoded private key.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(&self.to_bytes()[..]))
    }

    /// Derive the public key from this private key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            inner: *self.inner.verifying_key(),
        }
    }

    /// Account controlled by this key.
    pub fn account_id(&self) -> AccountId {
        self.public_key().to_account()
    }

    /// Sign a pre-hashed message (32-byte hash).
    pub fn sign_prehash(&self, hash: &H256) -> Result<Signature> {
        Signature::sign_prehash(&self.inner, hash)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }

    /// Sign a transaction's canonical hash.
    pub fn sign_transaction(&self, tx: Transaction) -> Result<SignedTransaction> {
        tx.sign(&self.inner)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }

    /// Access to the underlying signing key.
    pub fn signing_key(&self) -> &SigningKey {
        &self.inner
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_key", &self.public_key().to_hex_compressed())
            .finish()
    }
}

/// ECDSA public key
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    inner: VerifyingKey,
}

impl PublicKey {
    /// Create a public key from SEC1 encoded bytes (33 or 65 bytes).
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self> {
        let verifying_key = VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Ok(Self {
            inner: verifying_key,
        })
    }

    /// Create a public key from a hex string.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let bytes = hex::decode(hex)?;
        Self::from_sec1_bytes(&bytes)
    }

    /// Get the uncompressed public key bytes (64 bytes, without 0x04 prefix).
    pub fn to_uncompressed(&self) -> [u8; 64] {
        let point = self.inner.to_encoded_point(false);
        let mut result = [0u8; 64];
        result.copy_from_slice(&point.as_bytes()[1..65]);
        result
    }

    /// Get the compressed public key bytes (33 bytes).
    pub fn to_compressed(&self) -> [u8; 33] {
        let point = self.inner.to_encoded_point(true);
        let mut result = [0u8; 33];
        result.copy_from_slice(point.as_bytes());
        result
    }

    /// Get the hex-encoded compressed public key.
    pub fn to_hex_compressed(&self) -> String {
        hex::encode(self.to_compressed())
    }

    /// Derive the account identifier for this key.
    pub fn to_account(&self) -> AccountId {
        AccountId::from_public_key(&self.to_uncompressed())
    }

    /// Verify a signature against a pre-hashed message.
    ///
    /// Malformed signatures verify as false.
    pub fn verify_prehash(&self, hash: &H256, signature: &Signature) -> bool {
        let bytes = signature.to_bytes();
        match K256Signature::from_slice(&bytes[..64]) {
            Ok(sig) => self.inner.verify_prehash(hash.as_bytes(), &sig).is_ok(),
            Err(_) => false,
        }
    }

    /// Recover the public key that produced `signature` over `hash`.
    pub fn recover(hash: &H256, signature: &Signature) -> Result<Self> {
        let inner = signature
            .recover_key(hash)
            .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey")
            .field("compressed", &self.to_hex_compressed())
            .field("account", &self.to_account())
            .finish()
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex_compressed())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PublicKey::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
