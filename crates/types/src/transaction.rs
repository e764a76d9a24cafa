//! Ledger transactions.
//!
//! This module provides the transaction-related types for L2 Core:
//! - [`TxKind`] - the three recognised transaction kinds
//! - [`TxPayload`] - kind-specific fields
//! - [`Transaction`] - the semantic content that gets hashed and signed
//! - [`Signature`] - 65-byte recoverable secp256k1 signature
//! - [`SignedTransaction`] - a transaction with signature and canonical hash
//! - [`RawTransaction`] - the untyped intake form
//!
//! The canonical hash is Keccak256 over a fixed binary layout:
//!
//! ```text
//! DOMAIN_TAG || kind (1) || sender (20) || len(recipient) (u16 BE)
//!            || recipient || amount (u128 BE) || timestamp (u64 BE)
//! ```
//!
//! The signature is never part of the hash, so two independently built
//! representations of the same intent hash identically.

use crate::{AccountId, Amount, Error, Result, ValidatorId, H256};
use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Domain separation tag prefixed to every canonical transaction encoding.
pub const DOMAIN_TAG: &[u8] = b"l2core/tx/v1";

/// Size of a recoverable signature in bytes.
pub const SIGNATURE_SIZE: usize = 65;

/// Transaction kind identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TxKind {
    /// Token transfer between accounts
    Transfer = 0x01,
    /// Stake delegation to a validator
    Delegate = 0x02,
    /// Validator registration or self-stake update
    RegisterValidator = 0x03,
}

impl TxKind {
    /// Returns the kind byte used in the canonical encoding.
    pub const fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Returns the wire name of the kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::Delegate => "delegate",
            Self::RegisterValidator => "register_validator",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "transfer" => Ok(Self::Transfer),
            "delegate" => Ok(Self::Delegate),
            "register_validator" => Ok(Self::RegisterValidator),
            other => Err(Error::UnknownKind(other.to_string())),
        }
    }
}

/// Kind-specific transaction fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TxPayload {
    /// Move `amount` from the sender to `to`.
    Transfer {
        /// Recipient account
        to: AccountId,
        /// Amount to transfer
        amount: Amount,
    },
    /// Bond `amount` of the sender's balance to `validator`.
    Delegate {
        /// Target validator
        validator: ValidatorId,
        /// Amount to delegate
        amount: Amount,
    },
    /// Register the sender's validator or update its self-stake.
    RegisterValidator {
        /// Validator identity to register under
        validator: ValidatorId,
        /// Self-stake to bond
        self_stake: Amount,
    },
}

impl TxPayload {
    /// Returns the payload's kind.
    pub fn kind(&self) -> TxKind {
        match self {
            Self::Transfer { .. } => TxKind::Transfer,
            Self::Delegate { .. } => TxKind::Delegate,
            Self::RegisterValidator { .. } => TxKind::RegisterValidator,
        }
    }

    /// Returns the amount carried by the payload.
    pub fn amount(&self) -> Amount {
        match self {
            Self::Transfer { amount, .. } | Self::Delegate { amount, .. } => *amount,
            Self::RegisterValidator { self_stake, .. } => *self_stake,
        }
    }

    /// Returns the recipient bytes used in the canonical encoding.
    pub fn recipient_bytes(&self) -> &[u8] {
        match self {
            Self::Transfer { to, .. } => to.as_bytes(),
            Self::Delegate { validator, .. } | Self::RegisterValidator { validator, .. } => {
                validator.as_bytes()
            }
        }
    }

    /// Returns the recipient in its textual form.
    pub fn recipient_string(&self) -> String {
        match self {
            Self::Transfer { to, .. } => to.to_hex(),
            Self::Delegate { validator, .. } | Self::RegisterValidator { validator, .. } => {
                validator.to_string()
            }
        }
    }
}

/// An unsigned ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    /// Sending account
    pub sender: AccountId,
    /// Kind-specific fields
    pub payload: TxPayload,
    /// Submission time in Unix milliseconds, supplied by the submitter
    pub timestamp: u64,
}

impl Transaction {
    /// Creates a new transaction.
    pub fn new(sender: AccountId, payload: TxPayload, timestamp: u64) -> Self {
        Self {
            sender,
            payload,
            timestamp,
        }
    }

    /// Creates a transfer transaction.
    pub fn transfer(sender: AccountId, to: AccountId, amount: Amount, timestamp: u64) -> Self {
        Self::new(sender, TxPayload::Transfer { to, amount }, timestamp)
    }

    /// Creates a delegation transaction.
    pub fn delegate(
        sender: AccountId,
        validator: ValidatorId,
        amount: Amount,
        timestamp: u64,
    ) -> Self {
        Self::new(sender, TxPayload::Delegate { validator, amount }, timestamp)
    }

    /// Creates a validator registration transaction.
    pub fn register_validator(
        sender: AccountId,
        validator: ValidatorId,
        self_stake: Amount,
        timestamp: u64,
    ) -> Self {
        Self::new(
            sender,
            TxPayload::RegisterValidator {
                validator,
                self_stake,
            },
            timestamp,
        )
    }

    /// Returns the transaction kind.
    pub fn kind(&self) -> TxKind {
        self.payload.kind()
    }

    /// Returns the amount carried by the transaction.
    pub fn amount(&self) -> Amount {
        self.payload.amount()
    }

    /// Encodes the semantic fields in the fixed canonical layout.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let recipient = self.payload.recipient_bytes();
        let mut out = Vec::with_capacity(DOMAIN_TAG.len() + 1 + 20 + 2 + recipient.len() + 16 + 8);
        out.extend_from_slice(DOMAIN_TAG);
        out.push(self.kind().as_byte());
        out.extend_from_slice(self.sender.as_bytes());
        // ValidatorId is capped at 64 bytes and AccountId is 20, so this fits
        out.extend_from_slice(&(recipient.len() as u16).to_be_bytes());
        out.extend_from_slice(recipient);
        out.extend_from_slice(&self.amount().to_be_bytes());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out
    }

    /// Computes the canonical hash.
    pub fn canonical_hash(&self) -> H256 {
        H256::keccak256(&self.canonical_bytes())
    }

    /// Signs the transaction with the given private key.
    pub fn sign(self, signing_key: &SigningKey) -> Result<SignedTransaction> {
        let hash = self.canonical_hash();
        let signature = Signature::sign_prehash(signing_key, &hash)?;
        Ok(SignedTransaction::new(self, signature))
    }
}

/// A 65-byte recoverable secp256k1 signature laid out as `r || s || v`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; SIGNATURE_SIZE]);

impl Signature {
    /// Creates a signature from raw bytes (65 bytes: r[32] || s[32] || v[1]).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIGNATURE_SIZE {
            return Err(Error::InvalidLength {
                expected: SIGNATURE_SIZE,
                actual: bytes.len(),
            });
        }
        let mut out = [0u8; SIGNATURE_SIZE];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    /// Returns the raw signature bytes.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE] {
        self.0
    }

    /// Parses a signature from hex, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        Self::from_bytes(&bytes)
    }

    /// Returns the hex representation with 0x prefix.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Returns the recovery id byte. Accepts both `0/1` and legacy `27/28`.
    pub fn recovery_id(&self) -> u8 {
        match self.0[64] {
            v @ (27 | 28) => v - 27,
            v => v,
        }
    }

    /// Signs a 32-byte prehash.
    pub fn sign_prehash(signing_key: &SigningKey, hash: &H256) -> Result<Self> {
        let (signature, recovery_id) = signing_key
            .sign_prehash_recoverable(hash.as_bytes())
            .map_err(|e| Error::Signature(e.to_string()))?;

        let mut out = [0u8; SIGNATURE_SIZE];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = recovery_id.to_byte();
        Ok(Self(out))
    }

    /// Recovers the public key that produced this signature over `hash`.
    pub fn recover_key(&self, hash: &H256) -> Result<VerifyingKey> {
        let signature = K256Signature::from_slice(&self.0[..64])
            .map_err(|e| Error::Signature(e.to_string()))?;

        let recovery_id = RecoveryId::from_byte(self.recovery_id())
            .ok_or_else(|| Error::Signature("invalid recovery id".into()))?;

        VerifyingKey::recover_from_prehash(hash.as_bytes(), &signature, recovery_id)
            .map_err(|e| Error::Signature(e.to_string()))
    }

    /// Recovers the signing account from this signature over `hash`.
    pub fn recover_account(&self, hash: &H256) -> Result<AccountId> {
        let key = self.recover_key(hash)?;
        let encoded = key.to_encoded_point(false);
        Ok(AccountId::from_public_key(encoded.as_bytes()))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A transaction with its signature and canonical hash.
///
/// Constructing one never checks the signature; intake stays a syntactic
/// filter and authorization is verified when a block is assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SignedTransactionRepr")]
pub struct SignedTransaction {
    /// The transaction data
    pub transaction: Transaction,
    /// The signature
    pub signature: Signature,
    /// The canonical hash (computed)
    hash: H256,
}

impl SignedTransaction {
    /// Creates a new signed transaction and caches its canonical hash.
    pub fn new(transaction: Transaction, signature: Signature) -> Self {
        let hash = transaction.canonical_hash();
        Self {
            transaction,
            signature,
            hash,
        }
    }

    /// Returns the canonical hash.
    pub fn hash(&self) -> H256 {
        self.hash
    }

    /// Returns the claimed sender.
    pub fn sender(&self) -> AccountId {
        self.transaction.sender
    }

    /// Returns the transaction kind.
    pub fn kind(&self) -> TxKind {
        self.transaction.kind()
    }

    /// Returns the kind-specific payload.
    pub fn payload(&self) -> &TxPayload {
        &self.transaction.payload
    }

    /// Recovers the account that actually signed the transaction.
    pub fn recover_signer(&self) -> Result<AccountId> {
        self.signature.recover_account(&self.hash)
    }

    /// Returns true if the signature recovers to the claimed sender.
    pub fn verify(&self) -> bool {
        matches!(self.recover_signer(), Ok(signer) if signer == self.transaction.sender)
    }

    /// Returns the inner transaction.
    pub fn inner(&self) -> &Transaction {
        &self.transaction
    }
}

impl fmt::Display for SignedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({} from {} to {} amount {})",
            self.kind(),
            self.hash.short(),
            self.transaction.sender,
            self.transaction.payload.recipient_string(),
            self.transaction.amount()
        )
    }
}

#[derive(Deserialize)]
struct SignedTransactionRepr {
    transaction: Transaction,
    signature: Signature,
    #[serde(default)]
    hash: Option<H256>,
}

impl TryFrom<SignedTransactionRepr> for SignedTransaction {
    type Error = Error;

    fn try_from(repr: SignedTransactionRepr) -> Result<Self> {
        let tx = Self::new(repr.transaction, repr.signature);
        match repr.hash {
            Some(recorded) if recorded != tx.hash => Err(Error::InvalidHash(format!(
                "recorded {} does not match canonical {}",
                recorded, tx.hash
            ))),
            _ => Ok(tx),
        }
    }
}

/// The untyped form a transaction arrives in at intake.
///
/// Every field is optional so that presence checks are reported as
/// validation errors rather than deserialization failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    /// `transfer`, `delegate` or `register_validator`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Sender account as hex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Recipient account (transfer) or validator id (delegate, register)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    /// Decimal amount
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    /// Unix milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    /// 65-byte signature as hex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl From<&SignedTransaction> for RawTransaction {
    fn from(tx: &SignedTransaction) -> Self {
        Self {
            kind: Some(tx.kind().as_str().to_string()),
            sender: Some(tx.sender().to_hex()),
            recipient: Some(tx.payload().recipient_string()),
            amount: Some(tx.transaction.amount().to_string()),
            timestamp: Some(tx.transaction.timestamp),
            signature: Some(tx.signature.to_hex()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    fn key() -> SigningKey {
        SigningKey::from_slice(&[0x42u8; 32]).unwrap()
    }

    fn account_of(key: &SigningKey) -> AccountId {
        AccountId::from_public_key(key.verifying_key().to_encoded_point(false).as_bytes())
    }

    #[test]
    fn test_kind_roundtrip_names() {
        for kind in [TxKind::Transfer, TxKind::Delegate, TxKind::RegisterValidator] {
            assert_eq!(kind.as_str().parse::<TxKind>().unwrap(), kind);
        }
        assert!("stake".parse::<TxKind>().is_err());
    }

    #[test]
    fn test_canonical_layout() {
        let tx = Transaction::transfer(AccountId::new([1; 20]), AccountId::new([2; 20]), 7, 9);
        let bytes = tx.canonical_bytes();
        assert!(bytes.starts_with(DOMAIN_TAG));
        assert_eq!(bytes[DOMAIN_TAG.len()], 0x01);
        assert_eq!(bytes.len(), DOMAIN_TAG.len() + 1 + 20 + 2 + 20 + 16 + 8);
        assert_eq!(&bytes[bytes.len() - 8..], &9u64.to_be_bytes());
    }

    #[test]
    fn test_hash_excludes_signature() {
        let k = key();
        let tx = Transaction::transfer(account_of(&k), AccountId::new([2; 20]), 40, 1);
        let signed = tx.clone().sign(&k).unwrap();
        let unsigned = SignedTransaction::new(tx, Signature::from_bytes(&[0u8; 65]).unwrap());
        assert_eq!(signed.hash(), unsigned.hash());
    }

    #[test]
    fn test_sign_and_verify() {
        let k = key();
        let tx = Transaction::transfer(account_of(&k), AccountId::new([2; 20]), 40, 1);
        let signed = tx.sign(&k).unwrap();
        assert!(signed.verify());
        assert_eq!(signed.recover_signer().unwrap(), signed.sender());
    }

    #[test]
    fn test_verify_rejects_wrong_sender() {
        let k = key();
        let tx = Transaction::transfer(AccountId::new([9; 20]), AccountId::new([2; 20]), 40, 1);
        let signed = tx.sign(&k).unwrap();
        assert!(!signed.verify());
    }

    #[test]
    fn test_signed_serde_rejects_tampered_hash() {
        let k = key();
        let tx = Transaction::transfer(account_of(&k), AccountId::new([2; 20]), 40, 1);
        let signed = tx.sign(&k).unwrap();
        let mut value = serde_json::to_value(&signed).unwrap();
        let decoded: SignedTransaction = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(decoded, signed);

        value["hash"] = serde_json::json!(H256::keccak256(b"other").to_hex());
        assert!(serde_json::from_value::<SignedTransaction>(value).is_err());
    }
}
