//! 20-byte account identifier.
//!
//! An [`AccountId`] is derived from a secp256k1 public key the Ethereum way:
//! the last 20 bytes of `keccak256(uncompressed_pubkey[1..])`. It is the
//! sender identity every signed transaction is bound to.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

/// Size of an account identifier in bytes
pub const ACCOUNT_ID_SIZE: usize = 20;

/// A 20-byte account identifier, displayed as `0x` + 40 lowercase hex chars.
///
/// # Example
///
/// ```rust
/// use l2core_types::AccountId;
///
/// let id: AccountId = "0x742d35cc6634c0532925a3b844bc9e7595f0beb1".parse().unwrap();
/// assert!(!id.is_zero());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AccountId([u8; ACCOUNT_ID_SIZE]);

impl AccountId {
    /// The zero account. Never a valid sender.
    pub const ZERO: Self = Self([0u8; ACCOUNT_ID_SIZE]);

    /// Creates an account id from a 20-byte array.
    #[inline]
    pub const fn new(bytes: [u8; ACCOUNT_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Creates an account id from a slice of exactly 20 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != ACCOUNT_ID_SIZE {
            return Err(Error::InvalidLength {
                expected: ACCOUNT_ID_SIZE,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; ACCOUNT_ID_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Returns the raw bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Checks if this is the zero account.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self == &Self::ZERO
    }

    /// Parses an account id from hex, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let s = s.strip_prefix("0X").unwrap_or(s);

        if s.len() != 40 {
            return Err(Error::InvalidAccount(format!(
                "expected 40 hex characters, got {}",
                s.len()
            )));
        }

        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }

    /// Returns the lowercase hex representation with 0x prefix.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Derives an account id from an uncompressed public key.
    ///
    /// Accepts either the 65-byte SEC1 form (leading `0x04`) or the bare
    /// 64-byte `x || y` form.
    pub fn from_public_key(pubkey: &[u8]) -> Self {
        let key = if pubkey.len() == 65 && pubkey[0] == 0x04 {
            &pubkey[1..]
        } else {
            pubkey
        };
        let hash = Keccak256::digest(key);
        let mut bytes = [0u8; ACCOUNT_ID_SIZE];
        bytes.copy_from_slice(&hash[12..32]);
        Self(bytes)
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.to_hex())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for AccountId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl From<[u8; ACCOUNT_ID_SIZE]> for AccountId {
    fn from(bytes: [u8; ACCOUNT_ID_SIZE]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for AccountId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for AccountId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
