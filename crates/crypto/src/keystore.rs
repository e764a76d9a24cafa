//! # Encrypted Keystore
//!
//! Password-protected storage for a single secp256k1 private key.
//!
//! The passphrase is stretched with Argon2id into a 256-bit key, which seals
//! the private key with AES-256-GCM. Salt and nonce are fresh OsRng bytes on
//! every encryption, and the account id is bound in as associated data so a
//! keystore cannot be relabelled to another account.
//!
//! ```rust
//! use l2core_crypto::{KdfParams, Keystore, PrivateKey};
//!
//! let key = PrivateKey::random();
//! let store = Keystore::encrypt_with_params(&key, b"hunter2", KdfParams::light()).unwrap();
//! let restored = store.decrypt(b"hunter2").unwrap();
//! assert_eq!(restored.account_id(), key.account_id());
//! assert!(store.decrypt(b"wrong").is_err());
//! ```

use crate::{CryptoError, PrivateKey, Result};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use l2core_types::AccountId;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::path::Path;
use zeroize::Zeroizing;

const KEYSTORE_VERSION: u32 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const SYMMETRIC_KEY_LEN: usize = 32;
const CIPHER_ALGORITHM: &str = "aes-256-gcm";
const KDF_ALGORITHM: &str = "argon2id";

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests and throwaway keys.
    pub fn light() -> Self {
        Self {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn build(&self) -> Result<Params> {
        Ok(Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(SYMMETRIC_KEY_LEN),
        )?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CipherSection {
    algorithm: String,
    nonce: String,
    ciphertext: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct KdfSection {
    algorithm: String,
    salt: String,
    #[serde(flatten)]
    params: KdfParams,
}

/// A JSON keystore holding one encrypted private key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keystore {
    version: u32,
    /// Account the sealed key controls
    pub account: AccountId,
    cipher: CipherSection,
    kdf: KdfSection,
}

impl Keystore {
    /// Encrypt `key` under `passphrase` with the default Argon2id cost.
    pub fn encrypt(key: &PrivateKey, passphrase: &[u8]) -> Result<Self> {
        Self::encrypt_with_params(key, passphrase, KdfParams::default())
    }

    /// Encrypt `key` under `passphrase` with explicit Argon2id cost.
    pub fn encrypt_with_params(
        key: &PrivateKey,
        passphrase: &[u8],
        params: KdfParams,
    ) -> Result<Self> {
        let account = key.account_id();

        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let sym = derive_key(passphrase, &salt, &params)?;
        let cipher = Aes256Gcm::new_from_slice(sym.as_ref())
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;
        let secret = key.to_bytes();
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: secret.as_ref(),
                    aad: account.as_bytes(),
                },
            )
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        Ok(Self {
            version: KEYSTORE_VERSION,
            account,
            cipher: CipherSection {
                algorithm: CIPHER_ALGORITHM.to_string(),
                nonce: hex::encode(nonce),
                ciphertext: hex::encode(ciphertext),
            },
            kdf: KdfSection {
                algorithm: KDF_ALGORITHM.to_string(),
                salt: hex::encode(salt),
                params,
            },
        })
    }

    /// Decrypt the private key.
    ///
    /// # Errors
    ///
    /// [`CryptoError::Authentication`] on a wrong passphrase or any tampering
    /// with the ciphertext or the account label.
    pub fn decrypt(&self, passphrase: &[u8]) -> Result<PrivateKey> {
        if self.version != KEYSTORE_VERSION {
            return Err(CryptoError::InvalidKeystore(format!(
                "unsupported version {} (expected {})",
                self.version, KEYSTORE_VERSION
            )));
        }
        if self.cipher.algorithm != CIPHER_ALGORITHM {
            return Err(CryptoError::InvalidKeystore(format!(
                "unsupported cipher {}",
                self.cipher.algorithm
            )));
        }
        if self.kdf.algorithm != KDF_ALGORITHM {
            return Err(CryptoError::InvalidKeystore(format!(
                "unsupported kdf {}",
                self.kdf.algorithm
            )));
        }

        let salt = decode_fixed::<SALT_LEN>("salt", &self.kdf.salt)?;
        let nonce = decode_fixed::<NONCE_LEN>("nonce", &self.cipher.nonce)?;
        let ciphertext = hex::decode(&self.cipher.ciphertext)?;

        let sym = derive_key(passphrase, &salt, &self.kdf.params)?;
        let cipher = Aes256Gcm::new_from_slice(sym.as_ref())
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(
                    Nonce::from_slice(&nonce),
                    Payload {
                        msg: &ciphertext,
                        aad: self.account.as_bytes(),
                    },
                )
                .map_err(|_| CryptoError::Authentication)?,
        );

        if plaintext.len() != 32 {
            return Err(CryptoError::InvalidKeystore("sealed key is not 32 bytes".into()));
        }
        let mut bytes = Zeroizing::new([0u8; 32]);
        bytes.copy_from_slice(&plaintext);
        let key = PrivateKey::from_bytes(&bytes)?;

        if key.account_id() != self.account {
            return Err(CryptoError::InvalidKeystore(
                "decrypted key does not match account".into(),
            ));
        }
        Ok(key)
    }

    /// Write the keystore as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read a keystore from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

fn derive_key(
    passphrase: &[u8],
    salt: &[u8; SALT_LEN],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; SYMMETRIC_KEY_LEN]>> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.build()?);
    let mut out = Zeroizing::new([0u8; SYMMETRIC_KEY_LEN]);
    argon2.hash_password_into(passphrase, salt, out.as_mut())?;
    Ok(out)
}

fn decode_fixed<const N: usize>(field: &str, value: &str) -> Result<[u8; N]> {
    let bytes = hex::decode(value)?;
    bytes.as_slice().try_into().map_err(|_| {
        CryptoError::InvalidKeystore(format!(
            "invalid {} length: expected {}, found {}",
            field,
            N,
            bytes.len()
        ))
    })
}
